//! Two-level link collection over an in-memory course site
//!
//! Course pages list lecture pages; lecture pages link an audio recording.
//! Course pages are downloaded by a flat pool, then every course fans out to
//! a nested pool of lecture workers that all push into one output queue.
//! The collected links are printed as JSON.
//!
//! Run with: cargo run --example link_collection --features serialization

use fanout::prelude::*;
use fanout::{download, FetchPage};
use serde::Serialize;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SITE_URL: &str = "https://courses.example.org";

/// A fake site that answers from a map, with a little latency
struct Site {
    pages: HashMap<String, String>,
}

impl Site {
    fn build(courses: usize, lectures: usize) -> Self {
        let mut pages = HashMap::new();

        for c in 0..courses {
            let course_url = format!("{}/course-{}", SITE_URL, c);
            let mut body = String::new();

            for l in 0..lectures {
                let lecture_url = format!("{}/lecture-{}", course_url, l);
                body.push_str(&format!("lecture: {}\n", lecture_url));

                // Every fifth lecture page lacks an audio column.
                let lecture_body = if (c * lectures + l) % 5 == 4 {
                    "transcript only\n".to_string()
                } else {
                    format!(
                        "audio: {}/sites/default/files/audio/course{}-lecture{}.mp3\n",
                        SITE_URL, c, l
                    )
                };
                pages.insert(lecture_url, lecture_body);
            }

            pages.insert(course_url, body);
        }

        Self { pages }
    }

    fn course_urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self
            .pages
            .keys()
            .filter(|u| !u.contains("/lecture-"))
            .cloned()
            .collect();
        urls.sort();
        urls
    }
}

impl FetchPage for Site {
    fn fetch(&self, url: &str) -> fanout::Result<String> {
        thread::sleep(Duration::from_millis(5));
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(url, "404 Not Found"))
    }
}

#[derive(Debug, Serialize)]
struct Links {
    sound: String,
    subtitles: String,
}

fn lecture_urls(course_page: &str) -> Vec<String> {
    course_page
        .lines()
        .filter_map(|line| line.strip_prefix("lecture: "))
        .map(str::to_string)
        .collect()
}

fn sound_url(lecture_page: &str) -> Option<&str> {
    lecture_page
        .lines()
        .find_map(|line| line.strip_prefix("audio: "))
}

/// Guess the captions file from the recording's file name
fn subtitles_url(sound_url: &str) -> String {
    let file = sound_url.rsplit('/').next().unwrap_or(sound_url);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    format!("{}/sites/default/files/caption-files/{}.vtt", SITE_URL, stem)
}

/// Inner worker: fetch one lecture page and push its links
struct LectureWorker<'a> {
    site: &'a Site,
}

impl Worker for LectureWorker<'_> {
    type Item = String;
    type Output = Links;

    fn process(&mut self, url: String, output: &Queue<Links>) -> fanout::Result<()> {
        let page = self.site.fetch(&url)?;
        let sound = sound_url(&page)
            .ok_or_else(|| Error::Transform(format!("no audio column in {}", url)))?;

        output.push(Links {
            sound: sound.to_string(),
            subtitles: subtitles_url(sound),
        });
        Ok(())
    }
}

#[derive(Serialize)]
struct AllLinks {
    sound_urls: Vec<String>,
    subtitle_urls: Vec<String>,
}

fn main() -> fanout::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fanout=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let site = &Site::build(6, 8);

    let course_pages = download(site.course_urls(), site, fanout::DEFAULT_DOWNLOAD_THREADS)?;

    let courses = Pool::new(PoolConfig::new().with_concurrency(5).with_label("courses"));
    let outcome = courses.run(course_pages, move |_| {
        FanOut::new(
            |page: fanout::Page| -> fanout::Result<Vec<String>> { Ok(lecture_urls(&page.text)) },
            move |_| LectureWorker { site },
            PoolConfig::new().with_concurrency(5).with_label("lectures"),
        )
    })?;

    eprintln!("Done: {}", outcome.summary);
    eprintln!("Found {} links", outcome.results.len());

    let all = AllLinks {
        sound_urls: outcome.results.iter().map(|l| l.sound.clone()).collect(),
        subtitle_urls: outcome.results.iter().map(|l| l.subtitles.clone()).collect(),
    };
    let json = serde_json::to_string_pretty(&all).map_err(Error::transform)?;
    println!("{}", json);

    Ok(())
}
