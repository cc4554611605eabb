//! Chunk-parallel media downloader.
//!
//! A file is split into fixed-size chunks fetched by up to `downloadThreads`
//! concurrent requests. Chunks may complete out of order; a write cursor
//! flushes them to disk strictly in offset order, and the dispatcher never
//! keeps more than `2 × downloadThreads` chunks alive (in flight plus
//! buffered), so memory stays bounded no matter how large the file is.
//!
//! `FILE_MIGRATE` redirects all further chunk reads to the announced data
//! center and retries the failing chunk without spending its retry budget.
//! Small files and disabled acceleration degenerate to a single in-flight
//! chunk through the same code path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;

use crate::tg::api::{FileLocation, MediaInfo, TelegramApi, TgError};

/// Files below this size are not worth parallel fetching.
pub const ACCEL_MIN_SIZE: i64 = 1024 * 1024;

pub const MAX_DOWNLOAD_THREADS: usize = 8;

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    pub accelerate: bool,
    pub threads: usize,
    pub chunk_size: i32,
    pub max_retries: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            accelerate: true,
            threads: 5,
            chunk_size: 512 * 1024,
            max_retries: 3,
        }
    }
}

impl DownloadOptions {
    pub fn effective_threads(&self) -> usize {
        self.threads.clamp(1, MAX_DOWNLOAD_THREADS)
    }
}

pub struct Downloader {
    api: Arc<dyn TelegramApi>,
    opts: DownloadOptions,
}

impl Downloader {
    pub fn new(api: Arc<dyn TelegramApi>, opts: DownloadOptions) -> Self {
        Downloader { api, opts }
    }

    /// Write the media's full contents to `dest`, reporting
    /// `(bytes_downloaded, total_bytes)` after every fetched chunk.
    ///
    /// On error the partial file is left behind; callers must treat the
    /// checkpoint, not the filesystem, as the source of truth.
    pub async fn download(
        &self,
        media: &MediaInfo,
        dest: &Path,
        mut progress: impl FnMut(u64, u64) + Send,
    ) -> Result<()> {
        let location = media.location();
        let dc = Arc::new(AtomicI32::new(media.dc_id()));
        let mut file = fs::File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        match media.byte_size() {
            Some(total) => {
                let threads = if self.opts.accelerate && total >= ACCEL_MIN_SIZE {
                    self.opts.effective_threads()
                } else {
                    1
                };
                self.planned(&location, &dc, total, threads, &mut file, &mut progress)
                    .await?;
            }
            None => {
                self.streamed(&location, &dc, &mut file, &mut progress)
                    .await?;
            }
        }

        file.flush()
            .await
            .with_context(|| format!("failed to flush {}", dest.display()))?;
        Ok(())
    }

    /// Known total size: plan all chunks up front and fetch them with up to
    /// `threads` concurrent requests.
    async fn planned(
        &self,
        location: &FileLocation,
        dc: &Arc<AtomicI32>,
        total: i64,
        threads: usize,
        file: &mut fs::File,
        progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<()> {
        if total <= 0 {
            progress(0, 0);
            return Ok(());
        }

        let chunk = self.opts.chunk_size.max(1) as i64;
        let mut next_offset: i64 = 0;
        let mut write_cursor: i64 = 0;
        let mut downloaded: u64 = 0;
        let mut buffered: BTreeMap<i64, Vec<u8>> = BTreeMap::new();
        let mut in_flight: JoinSet<Result<(i64, Vec<u8>)>> = JoinSet::new();

        while write_cursor < total {
            while next_offset < total
                && in_flight.len() < threads
                && in_flight.len() + buffered.len() < 2 * threads
            {
                let limit = chunk.min(total - next_offset) as i32;
                let api = Arc::clone(&self.api);
                let location = location.clone();
                let dc = Arc::clone(dc);
                let offset = next_offset;
                let max_retries = self.opts.max_retries;
                in_flight
                    .spawn(async move { fetch_chunk(api, location, dc, offset, limit, max_retries).await });
                next_offset += chunk;
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (offset, bytes) = joined.context("chunk task aborted")??;
            downloaded += bytes.len() as u64;
            buffered.insert(offset, bytes);
            while let Some(ready) = buffered.remove(&write_cursor) {
                file.write_all(&ready)
                    .await
                    .with_context(|| format!("write failed at offset {write_cursor}"))?;
                write_cursor += chunk;
            }
            progress(downloaded, total as u64);
        }
        Ok(())
    }

    /// Unknown total size: stream chunks one at a time until a short read.
    async fn streamed(
        &self,
        location: &FileLocation,
        dc: &Arc<AtomicI32>,
        file: &mut fs::File,
        progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<()> {
        let chunk = self.opts.chunk_size.max(1);
        let mut offset: i64 = 0;
        let mut downloaded: u64 = 0;
        loop {
            let (_, bytes) = fetch_chunk(
                Arc::clone(&self.api),
                location.clone(),
                Arc::clone(dc),
                offset,
                chunk,
                self.opts.max_retries,
            )
            .await?;
            let n = bytes.len();
            if n > 0 {
                file.write_all(&bytes)
                    .await
                    .with_context(|| format!("write failed at offset {offset}"))?;
                downloaded += n as u64;
                offset += n as i64;
                progress(downloaded, 0);
            }
            if n < chunk as usize {
                return Ok(());
            }
        }
    }
}

/// Fetch a single chunk, retrying on transient errors with a linear
/// back-off of `1 s × attempt`. A data-center migration swaps the shared
/// sender and refetches immediately at no retry cost.
async fn fetch_chunk(
    api: Arc<dyn TelegramApi>,
    location: FileLocation,
    dc: Arc<AtomicI32>,
    offset: i64,
    limit: i32,
    max_retries: u32,
) -> Result<(i64, Vec<u8>)> {
    let mut retries: u32 = 0;
    loop {
        match api
            .file_chunk(dc.load(Ordering::Acquire), &location, offset, limit)
            .await
        {
            Ok(bytes) => return Ok((offset, bytes)),
            Err(TgError::FileMigrate(new_dc)) => {
                log::debug!("file lives in dc {new_dc}, refetching chunk at {offset}");
                dc.store(new_dc, Ordering::Release);
            }
            Err(err) => {
                retries += 1;
                if retries > max_retries {
                    return Err(err)
                        .with_context(|| format!("chunk at offset {offset} failed after {max_retries} retries"));
                }
                tokio::time::sleep(Duration::from_millis(1000 * retries as u64)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tg::api::{PhotoInfo, PhotoSizeInfo};
    use crate::tg::mock::{fixtures, FileFixture, MockApi};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const CHUNK: usize = 512 * 1024;

    fn opts(threads: usize) -> DownloadOptions {
        DownloadOptions {
            accelerate: true,
            threads,
            chunk_size: CHUNK as i32,
            max_retries: 3,
        }
    }

    use crate::tg::api::MediaInfo;

    struct Setup {
        api: Arc<MockApi>,
        media: MediaInfo,
        dir: tempfile::TempDir,
    }

    fn setup(len: usize, fixture_mod: impl FnOnce(&mut FileFixture)) -> Setup {
        let media = fixtures::document(1000, len as i64, 2);
        let mut fixture = FileFixture {
            bytes: fixtures::patterned_bytes(len),
            ..FileFixture::default()
        };
        fixture_mod(&mut fixture);
        let api = MockApi::new();
        api.set_file(media.location(), fixture);
        Setup {
            api: Arc::new(api),
            media,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    async fn run(setup: &Setup, opts: DownloadOptions) -> (Result<()>, Vec<(u64, u64)>, Vec<u8>) {
        let dest = setup.dir.path().join("out.bin");
        let events = Mutex::new(Vec::new());
        let downloader = Downloader::new(Arc::clone(&setup.api) as Arc<dyn TelegramApi>, opts);
        let result = downloader
            .download(&setup.media, &dest, |d, t| {
                events.lock().unwrap().push((d, t));
            })
            .await;
        let written = std::fs::read(&dest).unwrap_or_default();
        (result, events.into_inner().unwrap(), written)
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_mib_accelerated() {
        let len = 2 * 1024 * 1024;
        let s = setup(len, |_| {});
        let (result, events, written) = run(&s, opts(4)).await;
        result.expect("download should succeed");

        assert_eq!(written, fixtures::patterned_bytes(len), "bytes must round-trip");
        assert_eq!(s.api.chunk_calls.load(std::sync::atomic::Ordering::SeqCst), 4);
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0), "progress never goes backwards");
        assert_eq!(events.last(), Some(&(len as u64, len as u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_boundary_sizes() {
        for len in [0usize, 1, CHUNK - 1, CHUNK, CHUNK + 1] {
            let s = setup(len, |_| {});
            let (result, events, written) = run(&s, opts(4)).await;
            result.unwrap_or_else(|e| panic!("len {len}: {e:#}"));
            assert_eq!(written.len(), len, "len {len}");
            assert_eq!(written, fixtures::patterned_bytes(len), "len {len}");
            if len == 0 {
                assert_eq!(events, vec![(0, 0)]);
            } else {
                assert_eq!(events.last(), Some(&(len as u64, len as u64)), "len {len}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_file_uses_single_connection() {
        // Below 1 MiB the transfer degenerates to one chunk in flight.
        let len = CHUNK + 17;
        let s = setup(len, |_| {});
        let (result, _, written) = run(&s, opts(4)).await;
        result.expect("download should succeed");
        assert_eq!(written, fixtures::patterned_bytes(len));
        assert_eq!(
            s.api.max_chunks_in_flight.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acceleration_off_matches_accelerated_output() {
        let len = 3 * 1024 * 1024 + 5;
        let s1 = setup(len, |_| {});
        let (r1, e1, w1) = run(&s1, opts(4)).await;
        let s2 = setup(len, |_| {});
        let (r2, e2, w2) = run(
            &s2,
            DownloadOptions {
                accelerate: false,
                ..opts(4)
            },
        )
        .await;
        r1.expect("accelerated download");
        r2.expect("fallback download");
        assert_eq!(w1, w2, "both paths must produce identical bytes");
        assert_eq!(e1, e2, "both paths must produce identical progress events");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bounded_by_threads() {
        let len = 6 * 1024 * 1024;
        let s = setup(len, |_| {});
        let (result, _, _) = run(&s, opts(3)).await;
        result.expect("download should succeed");
        assert!(
            s.api.max_chunks_in_flight.load(std::sync::atomic::Ordering::SeqCst) <= 3,
            "no more than `threads` chunks may be in flight"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_migrate_on_first_chunk() {
        let len = 2 * 1024 * 1024;
        let s = setup(len, |f| f.migrate_at = Some((0, 4)));
        // A retry budget of zero proves migration costs no retries.
        let (result, _, written) = run(
            &s,
            DownloadOptions {
                max_retries: 0,
                ..opts(4)
            },
        )
        .await;
        result.expect("migration is transparent");

        assert_eq!(written, fixtures::patterned_bytes(len));
        assert_eq!(s.api.calls_at_offset(0), 2, "the redirected chunk is fetched exactly twice");
        assert!(s.api.calls_in_dc(4) >= 1, "the refetch goes to the announced dc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_migrate_on_middle_chunk_redirects_remaining_chunks() {
        let len = 2 * 1024 * 1024;
        let migrate_offset = 2 * CHUNK as i64;
        let s = setup(len, |f| f.migrate_at = Some((migrate_offset, 5)));
        // One chunk in flight makes the dc handoff order observable.
        let (result, _, written) = run(
            &s,
            DownloadOptions {
                max_retries: 0,
                ..opts(1)
            },
        )
        .await;
        result.expect("migration is transparent");
        assert_eq!(written, fixtures::patterned_bytes(len));
        assert_eq!(s.api.calls_at_offset(migrate_offset), 2);
        assert_eq!(s.api.calls_in_dc(2), 3, "chunks 0 and 1, plus the redirected attempt");
        assert_eq!(s.api.calls_in_dc(5), 2, "the refetch and the final chunk use the new dc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_max_retries_then_success() {
        let len = 2 * 1024 * 1024;
        let s = setup(len, |f| {
            f.fail_offsets = HashMap::from([(CHUNK as i64, 3)]);
        });
        let (result, _, written) = run(&s, opts(2)).await;
        result.expect("three failures fit in a budget of three retries");
        assert_eq!(written, fixtures::patterned_bytes(len));
        assert_eq!(s.api.calls_at_offset(CHUNK as i64), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhaustion_fails() {
        let len = 2 * 1024 * 1024;
        let s = setup(len, |f| {
            f.fail_offsets = HashMap::from([(CHUNK as i64, 4)]);
        });
        let (result, _, _) = run(&s, opts(2)).await;
        let err = format!("{:#}", result.expect_err("budget of three cannot absorb four failures"));
        assert!(err.contains(&format!("offset {CHUNK}")), "error names the offset: {err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_size_streams_sequentially() {
        let len = 2 * CHUNK + 123;
        let media = MediaInfo::Photo(PhotoInfo {
            id: 7,
            access_hash: 8,
            file_reference: vec![1],
            dc_id: 2,
            // No sizes: total size cannot be determined up front.
            sizes: Vec::new(),
        });
        let api = MockApi::new();
        api.set_file(
            media.location(),
            FileFixture {
                bytes: fixtures::patterned_bytes(len),
                ..FileFixture::default()
            },
        );
        let api = Arc::new(api);
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("photo.bin");

        let downloader = Downloader::new(Arc::clone(&api) as Arc<dyn TelegramApi>, opts(4));
        downloader
            .download(&media, &dest, |_, _| {})
            .await
            .expect("streamed download");

        assert_eq!(std::fs::read(&dest).expect("read back"), fixtures::patterned_bytes(len));
        assert_eq!(api.max_chunks_in_flight.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_clamping() {
        let mut o = DownloadOptions::default();
        o.threads = 0;
        assert_eq!(o.effective_threads(), 1);
        o.threads = 100;
        assert_eq!(o.effective_threads(), MAX_DOWNLOAD_THREADS);
        o.threads = 5;
        assert_eq!(o.effective_threads(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_photo_with_largest_plain_size() {
        // A photo with known sizes downloads via its largest size selector.
        let media = MediaInfo::Photo(PhotoInfo {
            id: 7,
            access_hash: 8,
            file_reference: vec![1],
            dc_id: 2,
            sizes: vec![
                PhotoSizeInfo::Plain { kind: "m".to_string(), bytes: 100 },
                PhotoSizeInfo::Plain { kind: "x".to_string(), bytes: 300 },
            ],
        });
        match media.location() {
            FileLocation::Photo { ref thumb_size, .. } => assert_eq!(thumb_size, "x"),
            other => panic!("unexpected location {other:?}"),
        }

        let api = MockApi::new();
        api.set_file(
            media.location(),
            FileFixture {
                bytes: fixtures::patterned_bytes(300),
                ..FileFixture::default()
            },
        );
        let api = Arc::new(api);
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("photo.jpg");
        Downloader::new(Arc::clone(&api) as Arc<dyn TelegramApi>, opts(4))
            .download(&media, &dest, |_, _| {})
            .await
            .expect("photo download");
        assert_eq!(std::fs::read(&dest).expect("read back").len(), 300);
    }
}
