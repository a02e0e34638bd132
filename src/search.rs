use crate::error::MillError;
use crate::image::{SearchParam, SearchResult, NO_MORE_DATA};
use crate::resolver::ContentResolver;
use crate::service::{
    ImageSearchService, RemoteError, SearchImageRequest, CODE_INVALID_START_PARAMETER,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Largest page the service will return.
pub const MAX_SEARCH_LIMIT: i64 = 100;

const SEARCH_TYPE_BY_PIC: &str = "SearchByPic";

/// Reverse image search: one picture in, one page of matching products out.
pub struct ImageSearcher {
    service: Arc<dyn ImageSearchService>,
    resolver: Arc<ContentResolver>,
}

impl ImageSearcher {
    pub fn new(service: Arc<dyn ImageSearchService>, resolver: Arc<ContentResolver>) -> Self {
        Self { service, resolver }
    }

    pub async fn search(&self, param: &SearchParam) -> Result<SearchResult, MillError> {
        let mut result = SearchResult::empty(&param.image_url);
        if param.offset < 0 {
            return Err(MillError::InvalidArgument("offset must >= 0".into()));
        }
        if param.image_url.is_empty() {
            return Err(MillError::InvalidArgument("image url is empty".into()));
        }

        let pic_content = self
            .resolver
            .resolve(&param.image_url, !param.use_origin_image)
            .await?;

        let limit = clamp_limit(param.limit);
        let request = SearchImageRequest {
            instance_name: param.instance_name.clone(),
            pic_content,
            search_type: SEARCH_TYPE_BY_PIC.to_string(),
            category_id: param.category_id,
            filter: format!(r#"str_attr="{}""#, param.str_attr),
            start: param.offset,
            num: limit,
        };

        let response = match self.service.search_image(request).await {
            Ok(response) => response,
            Err(err) => return map_search_error(err, result),
        };
        log::trace!("Search response: {:?}", response);

        result.docs_found = response.head.docs_found;
        result.docs_return = response.head.docs_return;
        result.search_time = response.head.search_time;
        // A full page suggests there may be more.
        if response.head.docs_return >= limit {
            result.offset = param.offset.checked_add(limit).unwrap_or(NO_MORE_DATA);
        }

        let product_ids = response.auctions.into_iter().map(|a| a.product_id);
        result.product_ids = if param.is_removal {
            first_occurrences(product_ids)
        } else {
            product_ids.collect()
        };
        log::debug!(
            "Search for {} returned {} ids, next offset {}",
            param.image_url,
            result.product_ids.len(),
            result.offset
        );
        Ok(result)
    }
}

fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 || limit > MAX_SEARCH_LIMIT {
        MAX_SEARCH_LIMIT
    } else {
        limit
    }
}

fn first_occurrences(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.clone())).collect()
}

fn map_search_error(err: RemoteError, empty: SearchResult) -> Result<SearchResult, MillError> {
    if err.code() == Some(CODE_INVALID_START_PARAMETER) {
        log::debug!("Search start is past the last result");
        return Ok(empty);
    }
    if err.is_rate_limited() {
        return Err(MillError::Throttled);
    }
    if let Some(fault) = err.fault().filter(|f| !f.message.is_empty()) {
        return Err(MillError::Search(fault.message.clone()));
    }
    log::error!("Image search failed: {}", err);
    Err(MillError::Search(err.to_string()))
}
