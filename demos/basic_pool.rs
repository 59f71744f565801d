//! Basic pool example demonstrating the core concepts

use fanout::prelude::*;
use std::thread;
use std::time::Duration;

/// Counts the words of each line, keyed by line number
struct WordCounter;

impl Worker for WordCounter {
    type Item = (usize, &'static str);
    type Output = (usize, usize);

    fn process(&mut self, (index, line): Self::Item, output: &Queue<Self::Output>) -> Result<()> {
        if line.is_empty() {
            return Err(Error::Transform(format!("line {} is empty", index)));
        }
        thread::sleep(Duration::from_millis(20));
        output.push((index, line.split_whitespace().count()));
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Basic Pool Example ===\n");

    let lines = vec![
        "the quick brown fox",
        "jumps over",
        "",
        "the lazy dog",
        "and keeps running until the queue is empty",
    ];

    let pool = Pool::new(PoolConfig::new().with_concurrency(3).with_label("words"));
    let outcome = pool.run(lines.into_iter().enumerate(), |_| WordCounter)?;

    let mut counts = outcome.results;
    counts.sort();
    for (index, words) in &counts {
        println!("line {}: {} words", index, words);
    }

    println!("\n{}", outcome.summary);
    for failure in &outcome.summary.failures {
        println!("dropped by worker {}: {}", failure.worker, failure.error);
    }

    Ok(())
}
