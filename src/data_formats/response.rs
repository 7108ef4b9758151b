/// The page a visitor asked for, before the total is known.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    number: Option<i64>,
    per_page: i64,
}

impl PageRequest {
    /// `raw` is the `page` query value; anything that is not an integer means
    /// the first page.
    pub fn new(raw: Option<&str>, per_page: i64) -> Self {
        PageRequest {
            number: raw.map(|s| s.trim().parse::<i64>().ok()).unwrap_or(Some(1)),
            per_page: per_page.max(1),
        }
    }

    /// Clamps the request against `total` items. Out-of-range numbers land on
    /// the last page.
    pub fn resolve(self, total: i64) -> Paginator {
        let num_pages = ((total + self.per_page - 1) / self.per_page).max(1);
        let number = match self.number {
            None => 1,
            Some(n) if n < 1 || n > num_pages => num_pages,
            Some(n) => n,
        };
        Paginator {
            number,
            per_page: self.per_page,
            num_pages,
            total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub number: i64,
    pub per_page: i64,
    pub num_pages: i64,
    pub total: i64,
}

impl Paginator {
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn wrap<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            paginator: self,
        }
    }
}

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paginator: Paginator,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.paginator.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.paginator.number < self.paginator.num_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_garbage_page_is_first_page() {
        assert_eq!(PageRequest::new(None, 10).resolve(35).number, 1);
        assert_eq!(PageRequest::new(Some("abc"), 10).resolve(35).number, 1);
    }

    #[test]
    fn out_of_range_page_is_last_page() {
        let paginator = PageRequest::new(Some("99"), 10).resolve(35);
        assert_eq!(paginator.num_pages, 4);
        assert_eq!(paginator.number, 4);
        assert_eq!(paginator.offset(), 30);

        assert_eq!(PageRequest::new(Some("0"), 10).resolve(35).number, 4);
    }

    #[test]
    fn empty_feed_still_has_one_page() {
        let page = PageRequest::new(None, 10).resolve(0).wrap(Vec::<i64>::new());
        assert_eq!(page.paginator.num_pages, 1);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn middle_page_links_both_ways() {
        let page = PageRequest::new(Some("2"), 10)
            .resolve(35)
            .wrap(vec![1, 2, 3]);
        assert_eq!(page.paginator.offset(), 10);
        assert!(page.has_next());
        assert!(page.has_previous());
    }
}
