use crate::serde::Deserialize;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (total + self.limit - 1) / self.limit
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_offset() {
        let p = Pagination { page: 1, limit: 10 };
        assert_eq!(p.offset(), 0);
        let p = Pagination { page: 3, limit: 10 };
        assert_eq!(p.offset(), 20);
        // pages below 1 are clamped
        let p = Pagination { page: 0, limit: 10 };
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_total_pages() {
        let p = Pagination { page: 1, limit: 10 };
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(99), 10);
    }
}
