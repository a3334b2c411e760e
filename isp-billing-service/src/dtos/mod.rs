//! Request and response bodies that are not plain models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ConnectionStatus;

#[derive(Debug, Deserialize)]
pub struct SetCustomerStatusRequest {
    pub status: ConnectionStatus,
}

/// Body of the job trigger routes. `today` defaults to the current UTC date.
#[derive(Debug, Default, Deserialize)]
pub struct RunJobRequest {
    pub today: Option<NaiveDate>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass as `page_token` to fetch the next page; absent on the last page.
    pub next_page_token: Option<Uuid>,
}

impl<T> Page<T> {
    /// Build a page, emitting a cursor only when the page came back full.
    pub fn new(items: Vec<T>, page_size: i64, id: impl Fn(&T) -> Uuid) -> Self {
        let next_page_token = if items.len() as i64 >= page_size {
            items.last().map(id)
        } else {
            None
        };
        Self {
            items,
            next_page_token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    pub subscription_id: Uuid,
    pub is_active: bool,
}
