use crate::error::{MarketError, Result};

/// Splits item identifier lists into price API URLs that stay under the
/// configured URL length and preferred batch size.
///
/// The partition is greedy first-fit: identifiers are appended to the current
/// batch until the next one would push the URL past the limit, which closes
/// the batch and seeds a new one. Every input id lands in exactly one URL, in
/// input order.
pub struct BatchUrlBuilder {
    base_url: String,
    query: String,
    max_url_length: usize,
    max_items: usize,
}

impl BatchUrlBuilder {
    pub fn new(base_url: &str, locations: &[&str], max_url_length: usize, max_items: usize) -> Self {
        let cities = locations
            .iter()
            .map(|c| c.replace(' ', "%20"))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            base_url: base_url.to_string(),
            query: format!("locations={}&qualities=1", cities),
            max_url_length,
            max_items,
        }
    }

    /// URL for a single known-small id list, bypassing the batching bounds.
    pub fn url_for(&self, items: &[String]) -> String {
        format!("{}{}.json?{}", self.base_url, items.join(","), self.query)
    }

    /// Fixed URL overhead around the comma-joined id list.
    fn base_length(&self) -> usize {
        self.base_url.len() + ".json?".len() + self.query.len()
    }

    pub fn build(&self, items: &[String]) -> Result<Vec<String>> {
        let base_length = self.base_length();
        let mut urls = Vec::new();
        let mut batch: Vec<&str> = Vec::new();
        let mut length = base_length;

        for item in items {
            if base_length + item.len() > self.max_url_length {
                return Err(MarketError::Config(format!(
                    "item id '{}' cannot fit in a {}-character URL",
                    item, self.max_url_length
                )));
            }

            let separator = if batch.is_empty() { 0 } else { 1 };
            let next_length = length + separator + item.len();

            if next_length <= self.max_url_length && batch.len() < self.max_items {
                batch.push(item.as_str());
                length = next_length;
            } else {
                urls.push(self.join(&batch));
                batch = vec![item.as_str()];
                length = base_length + item.len();
            }
        }

        if !batch.is_empty() {
            urls.push(self.join(&batch));
        }

        Ok(urls)
    }

    fn join(&self, batch: &[&str]) -> String {
        format!("{}{}.json?{}", self.base_url, batch.join(","), self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASE_URL, CITIES};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T4_ITEM_{:03}", i)).collect()
    }

    fn builder(max_len: usize, max_items: usize) -> BatchUrlBuilder {
        BatchUrlBuilder::new(BASE_URL, &CITIES, max_len, max_items)
    }

    /// Pulls the comma-joined id list back out of an emitted URL.
    fn items_of(url: &str) -> Vec<String> {
        let rest = url.strip_prefix(BASE_URL).unwrap();
        let list = rest.split(".json?").next().unwrap();
        list.split(',').map(str::to_string).collect()
    }

    #[test]
    fn batches_reconstruct_the_input_in_order() {
        let input = ids(120);
        let urls = builder(400, 50).build(&input).unwrap();
        assert!(urls.len() > 1);

        let rebuilt: Vec<String> = urls.iter().flat_map(|u| items_of(u)).collect();
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn no_url_exceeds_the_ceiling() {
        let urls = builder(400, 50).build(&ids(120)).unwrap();
        for url in &urls {
            assert!(url.len() <= 400, "{} chars: {}", url.len(), url);
        }
    }

    #[test]
    fn item_count_bound_applies_independently() {
        let urls = builder(4096, 10).build(&ids(35)).unwrap();
        assert_eq!(urls.len(), 4);
        assert_eq!(items_of(&urls[0]).len(), 10);
        assert_eq!(items_of(&urls[3]).len(), 5);
    }

    #[test]
    fn oversized_identifier_is_a_config_error() {
        let giant = vec!["X".repeat(500)];
        let err = builder(400, 50).build(&giant).unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }

    #[test]
    fn identical_input_gives_identical_batches() {
        let input = ids(77);
        let b = builder(500, 50);
        assert_eq!(b.build(&input).unwrap(), b.build(&input).unwrap());
    }

    #[test]
    fn city_names_are_percent_encoded() {
        let url = builder(4096, 50).url_for(&ids(1));
        assert!(url.contains("Fort%20Sterling"));
        assert!(url.contains("Black%20Market"));
        assert!(url.ends_with("&qualities=1"));
    }
}
