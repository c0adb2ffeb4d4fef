use crate::request::Pagination;
use crate::serde::Serialize;

/// Listing shape used by the public discovery endpoints.
#[derive(Debug, Serialize)]
pub struct DataList<T> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> DataList<T> {
    pub fn new(data: Vec<T>) -> Self {
        let count = data.len();
        DataList { data, count }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub id: i32,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        MessageResponse { message: message.to_owned() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageInfo {
    pub fn new(pagination: &Pagination, total: i64) -> Self {
        PageInfo {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages(total),
        }
    }
}
