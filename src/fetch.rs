//! Concurrent page downloads
//!
//! The crate does not ship an HTTP client. Callers plug one in through
//! [`FetchPage`], and [`download`] runs it on a pool of [`Downloader`]
//! workers.

use crate::error::Result;
use crate::pool::{Pool, PoolConfig};
use crate::queue::Queue;
use crate::worker::Worker;
use tracing::info;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Default number of download threads
pub const DEFAULT_DOWNLOAD_THREADS: usize = 40;

/// Fetch the body of a page as text
///
/// Implementations are shared by every download thread and must be `Sync`.
/// Closures of the form `Fn(&str) -> Result<String>` implement this trait.
pub trait FetchPage: Sync {
    /// Fetch `url`
    fn fetch(&self, url: &str) -> Result<String>;
}

impl<F> FetchPage for F
where
    F: Fn(&str) -> Result<String> + Sync,
{
    fn fetch(&self, url: &str) -> Result<String> {
        self(url)
    }
}

/// A downloaded page, keyed by the URL it came from
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Page {
    /// Requested URL
    pub url: String,

    /// Page body
    pub text: String,
}

/// Worker that fetches one URL per item
pub struct Downloader<'a, P: ?Sized> {
    fetcher: &'a P,
}

impl<'a, P: FetchPage + ?Sized> Downloader<'a, P> {
    /// Create a downloader around a shared fetcher
    pub fn new(fetcher: &'a P) -> Self {
        Self { fetcher }
    }
}

impl<'a, P: FetchPage + ?Sized> Worker for Downloader<'a, P> {
    type Item = String;
    type Output = Page;

    fn process(&mut self, url: String, output: &Queue<Page>) -> Result<()> {
        let text = self.fetcher.fetch(&url)?;
        output.push(Page { url, text });
        Ok(())
    }
}

/// Download every URL on `concurrency` threads
///
/// Pages that fail to download are left out of the result.
pub fn download<P, It>(urls: It, fetcher: &P, concurrency: usize) -> Result<Vec<Page>>
where
    P: FetchPage + ?Sized,
    It: IntoIterator<Item = String>,
{
    let urls: Vec<String> = urls.into_iter().collect();
    let requested = urls.len();

    info!(pages = requested, "starting download");

    let config = PoolConfig::new()
        .with_concurrency(concurrency)
        .with_label("download");
    let outcome = Pool::new(config).run(urls, |_| Downloader::new(fetcher))?;

    info!(
        pages = outcome.results.len(),
        requested,
        elapsed_secs = outcome.summary.elapsed.as_secs_f64(),
        "completed download"
    );

    Ok(outcome.results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;

    struct FakeSite {
        pages: HashMap<String, String>,
    }

    impl FakeSite {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, t)| (u.to_string(), t.to_string()))
                    .collect(),
            }
        }
    }

    impl FetchPage for FakeSite {
        fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::fetch(url, "404 Not Found"))
        }
    }

    #[test]
    fn test_download_keys_pages_by_url() {
        let site = FakeSite::new(&[("https://a.test/1", "one"), ("https://a.test/2", "two")]);

        let mut pages = download(
            vec!["https://a.test/1".to_string(), "https://a.test/2".to_string()],
            &site,
            DEFAULT_DOWNLOAD_THREADS,
        )
        .unwrap();
        pages.sort_by(|a, b| a.url.cmp(&b.url));

        assert_eq!(
            pages,
            vec![
                Page { url: "https://a.test/1".to_string(), text: "one".to_string() },
                Page { url: "https://a.test/2".to_string(), text: "two".to_string() },
            ]
        );
    }

    #[test]
    fn test_missing_pages_are_dropped() {
        let site = FakeSite::new(&[("https://a.test/1", "one")]);

        let pages = download(
            vec!["https://a.test/1".to_string(), "https://a.test/404".to_string()],
            &site,
            2,
        )
        .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "one");
    }

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |url: &str| -> Result<String> { Ok(url.to_uppercase()) };

        let pages = download(vec!["abc".to_string()], &fetcher, 1).unwrap();

        assert_eq!(pages[0].text, "ABC");
    }

    #[test]
    fn test_downloader_as_worker() {
        let site = FakeSite::new(&[("u", "body")]);
        let output = Queue::new();

        let mut downloader = Downloader::new(&site);
        downloader.process("u".to_string(), &output).unwrap();
        let err = downloader.process("v".to_string(), &output).unwrap_err();

        assert_eq!(output.drain_all()[0].text, "body");
        assert_eq!(err, Error::fetch("v", "404 Not Found"));
    }
}
