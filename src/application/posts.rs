//! Fetching the post list of a Notion blog database.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::application::ports::{
    DocumentSource, PageIdLister, PropertyDecoder, PublishFilter, PublishedOnly, ReducerPageIds,
    SchemaDecoder, SourceError,
};
use crate::cache::{CacheKey, PostsCache};
use crate::domain::ids::PageId;
use crate::domain::metadata::PageMetadata;
use crate::domain::posts::{PostRecord, assemble_post, sort_by_date_desc};

pub(crate) const METRIC_FETCH_MS: &str = "notion_feed_fetch_ms";
pub(crate) const METRIC_POSTS_DISCARDED: &str = "notion_feed_posts_discarded_total";

const DEFAULT_DECODE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Zone for date properties that do not name one.
    pub zone: Tz,
    pub sort_by_date: bool,
    pub decode_concurrency: NonZeroUsize,
    /// Read row ids from this view only; every view when unset.
    pub view_id: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            zone: Tz::UTC,
            sort_by_date: false,
            decode_concurrency: NonZeroUsize::new(DEFAULT_DECODE_CONCURRENCY)
                .unwrap_or(NonZeroUsize::MIN),
            view_id: None,
        }
    }
}

/// Result of a fetch. A root that is not a database is reported as such
/// rather than as an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Posts(Vec<PostRecord>),
    NotADatabase { id: PageId },
}

impl FetchOutcome {
    pub fn posts(&self) -> &[PostRecord] {
        match self {
            Self::Posts(posts) => posts,
            Self::NotADatabase { .. } => &[],
        }
    }

    pub fn into_posts(self) -> Vec<PostRecord> {
        match self {
            Self::Posts(posts) => posts,
            Self::NotADatabase { .. } => Vec::new(),
        }
    }

    pub fn is_database(&self) -> bool {
        matches!(self, Self::Posts(_))
    }
}

#[derive(Clone)]
pub struct PostsService {
    source: Arc<dyn DocumentSource>,
    lister: Arc<dyn PageIdLister>,
    decoder: Arc<dyn PropertyDecoder>,
    filter: Arc<dyn PublishFilter>,
    cache: Option<Arc<PostsCache>>,
    settings: FetchSettings,
}

impl PostsService {
    /// Service with the stock lister, decoder and publish filter.
    pub fn new(source: Arc<dyn DocumentSource>, settings: FetchSettings) -> Self {
        Self::with_collaborators(
            source,
            Arc::new(ReducerPageIds::for_view(settings.view_id.clone())),
            Arc::new(SchemaDecoder),
            Arc::new(PublishedOnly),
            settings,
        )
    }

    pub fn with_collaborators(
        source: Arc<dyn DocumentSource>,
        lister: Arc<dyn PageIdLister>,
        decoder: Arc<dyn PropertyDecoder>,
        filter: Arc<dyn PublishFilter>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            source,
            lister,
            decoder,
            filter,
            cache: None,
            settings,
        }
    }

    pub fn with_cache(mut self, cache: Arc<PostsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<PostsCache>> {
        self.cache.as_ref()
    }

    pub async fn fetch_all_posts(
        &self,
        target: &PageId,
        include_pages: bool,
    ) -> Result<FetchOutcome, SourceError> {
        self.fetch_all_posts_at(target, include_pages, Utc::now()).await
    }

    /// Like [`fetch_all_posts`](Self::fetch_all_posts) but served from the
    /// cache while the stored result is fresh.
    pub async fn cached_posts(
        &self,
        target: &PageId,
        include_pages: bool,
    ) -> Result<FetchOutcome, SourceError> {
        let Some(cache) = self.cache.as_ref() else {
            return self.fetch_all_posts(target, include_pages).await;
        };

        let key = CacheKey::new(target.clone(), include_pages);
        if let Some(outcome) = cache.get(&key) {
            debug!(
                target = "notion_feed::posts",
                id = %target,
                include_pages,
                "Serving cached posts"
            );
            return Ok(outcome);
        }

        let outcome = self.fetch_all_posts(target, include_pages).await?;
        cache.put(key, outcome.clone());
        Ok(outcome)
    }

    /// Fetch, assemble, filter and optionally sort the rows under `target`,
    /// using `now` for the publish cut-off and missing timestamps.
    pub async fn fetch_all_posts_at(
        &self,
        target: &PageId,
        include_pages: bool,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome, SourceError> {
        let started_at = Instant::now();
        let graph = self.source.fetch_document_graph(target).await?;

        debug!(
            target = "notion_feed::posts",
            id = %target,
            blocks = graph.block_count(),
            collections = graph.collections().len(),
            rejected = graph.rejected().len(),
            "Fetched document graph"
        );

        let Some(database) = graph.detect_database(target.as_str()) else {
            warn!(
                target = "notion_feed::posts",
                id = %target,
                root_type = graph.block(target.as_str()).and_then(|b| b.kind()).unwrap_or(""),
                "Root page is not a database"
            );
            return Ok(FetchOutcome::NotADatabase { id: target.clone() });
        };

        let page_ids = self.lister.list_page_ids(graph.collection_query());
        info!(
            target = "notion_feed::posts",
            id = %target,
            collection = database.collection_id.unwrap_or(""),
            root_type = database.root_kind.unwrap_or(""),
            schema_fields = database.schema.map_or(0, |schema| schema.len()),
            pages = page_ids.len(),
            "Resolved database rows"
        );

        let graph = &graph;
        let schema = database.schema;
        let decoder = &self.decoder;
        let decoded: Vec<(String, _)> = stream::iter(page_ids)
            .map(|page_id| async move {
                let properties = decoder.decode(&page_id, graph, schema).await?;
                Ok::<_, SourceError>((page_id, properties))
            })
            .buffered(self.settings.decode_concurrency.get())
            .try_collect()
            .await?;

        let now_ms = now.timestamp_millis();
        let mut records = Vec::with_capacity(decoded.len());
        let mut discarded = 0_u64;
        for (page_id, properties) in decoded {
            let block = graph.block(&page_id);
            let post = properties.and_then(|properties| {
                assemble_post(&page_id, properties, block, self.settings.zone, now_ms)
            });
            match post {
                Some(post) => records.push(post),
                None => {
                    discarded += 1;
                    debug!(
                        target = "notion_feed::posts",
                        page_id = page_id.as_str(),
                        resolved = block.is_some(),
                        "Skipping row without properties"
                    );
                }
            }
        }
        counter!(METRIC_POSTS_DISCARDED).increment(discarded);

        let extracted = records.len();
        let mut posts = self.filter.filter(records, include_pages, now_ms);
        if self.settings.sort_by_date {
            sort_by_date_desc(&mut posts);
        }

        info!(
            target = "notion_feed::posts",
            id = %target,
            include_pages,
            extracted,
            discarded,
            visible = posts.len(),
            "Fetched posts"
        );
        histogram!(METRIC_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        Ok(FetchOutcome::Posts(posts))
    }

    /// Display metadata of the root block, `None` when the graph lacks it.
    pub async fn page_metadata(
        &self,
        target: &PageId,
    ) -> Result<Option<PageMetadata>, SourceError> {
        let graph = self.source.fetch_document_graph(target).await?;
        Ok(graph.block(target.as_str()).map(PageMetadata::from))
    }
}
