//! Basic usage of lazy fields and paginated readers.

use futures::FutureExt;
use lazy_kit::{
    error::Result, EntityLoader, FieldKey, InMemoryRepository, LazyConfig, LazyEntity, LazyFields,
    Page, PagedReader, Ttl,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LYRIC: FieldKey<String> = FieldKey::new("lyric");
const PLAYS: FieldKey<u64> = FieldKey::new("plays");

/// Counts simulated remote calls.
static REMOTE_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Example entity: Song
struct Song {
    mid: String,
    title: String,
    fields: LazyFields<Song>,
}

impl LazyEntity for Song {
    type Id = String;

    fn identifier(&self) -> &Self::Id {
        &self.mid
    }

    fn kind() -> &'static str {
        "song"
    }

    fn lazy_fields(&self) -> &LazyFields<Self> {
        &self.fields
    }
}

impl Song {
    fn new(mid: &str, title: &str, config: &LazyConfig) -> Song {
        let song = Song {
            mid: mid.to_string(),
            title: title.to_string(),
            fields: LazyFields::new().with_config(config),
        };

        song.fields
            .declare(&LYRIC, Ttl::Forever, |song: &Song| {
                async move {
                    REMOTE_CALLS.fetch_add(1, Ordering::SeqCst);
                    println!("  [API] Fetching lyric for {}", song.mid);
                    Ok(format!("[00:00.00] {}", song.title))
                }
                .boxed()
            })
            .declare(&PLAYS, Duration::from_secs(30), |song: &Song| {
                async move {
                    REMOTE_CALLS.fetch_add(1, Ordering::SeqCst);
                    println!("  [API] Fetching play count for {}", song.mid);
                    Ok(1_000)
                }
                .boxed()
            });

        song
    }

    /// Decode a full song record; the record already carries the play count.
    fn from_record(mid: &String, raw: serde_json::Value) -> Result<Song> {
        let title = raw["title"].as_str().unwrap_or("Unknown");
        let song = Song::new(mid, title, &LazyConfig::default());
        if let Some(plays) = raw["plays"].as_u64() {
            song.fields.store(&PLAYS, plays)?;
        }
        Ok(song)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Lazy Kit - Basic Example ===\n");

    // 1. Configuration
    println!("1. Loading configuration from LAZY_KIT_* environment variables...");
    let config = LazyConfig::from_env()?;
    println!("   ✓ {:?}\n", config);

    // 2. Lazy fields
    println!("2. Reading a lazy field twice:");
    let song = Song::new("001", "Nocturne", &config);
    let lyric = song.fields.read(&song, &LYRIC).await?;
    let again = song.fields.read(&song, &LYRIC).await?;
    assert_eq!(lyric, again);
    println!(
        "   ✓ Lyric: {} ({} remote call)\n",
        lyric,
        REMOTE_CALLS.load(Ordering::SeqCst)
    );

    // 3. Full retrieval
    println!("3. Retrieving a full record (fields seeded, never expire):");
    let repository = InMemoryRepository::new(Song::from_record);
    repository.insert(
        "002".to_string(),
        json!({ "title": "Sunny Day", "plays": 52_000 }),
    );
    let loader = EntityLoader::new(repository);
    let full = loader.require(&"002".to_string()).await?;
    let plays = full.fields.read(&full, &PLAYS).await?;
    println!("   ✓ {} has {} plays, stage {:?}\n", full.title, plays, full.stage());

    // 4. Paginated reader
    println!("4. Paging through an artist's songs:");
    let pages = Arc::new(AtomicUsize::new(0));
    let counter = pages.clone();
    let fetch = move |artist: String, page: u32| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("  [API] Fetching page {} of {}", page, artist);
            let list = match page {
                1 => vec!["Intro", "Verse"],
                2 => vec!["Chorus"],
                _ => vec![],
            };
            Ok::<_, lazy_kit::Error>(Page::new(3, list))
        }
    };

    let mut songs = PagedReader::builder(fetch, "artist_42".to_string())
        .with_config(&config)
        .create()
        .await?;
    println!("   ✓ {} songs announced", songs.total());

    while let Some(title) = songs.next().await? {
        println!("   - {}", title);
    }
    println!("   ✓ Done after {} page fetches\n", pages.load(Ordering::SeqCst));

    println!("=== Example Complete ===\n");

    Ok(())
}
