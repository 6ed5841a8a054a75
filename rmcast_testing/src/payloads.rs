//! Payload builders sized to span a chosen number of fragments.

use rmcast::records::{CrawlRecord, SearchPayload};

/// Crawl record whose description is `len` characters of deterministic,
/// poorly compressible text.
///
/// Compression barely shrinks the result, so a record of `len` bytes spans
/// roughly `len / fragment_payload_cap` fragments.
pub fn bulky_record(url: &str, len: usize, seed: u64) -> SearchPayload {
    SearchPayload::Crawl(CrawlRecord {
        description: noise(len, seed),
        ..CrawlRecord::new(url)
    })
}

/// Crawl record small enough for a single fragment.
pub fn small_record(url: &str) -> SearchPayload {
    SearchPayload::Crawl(CrawlRecord::new(url).with_title("small"))
}

fn noise(len: usize, seed: u64) -> String {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            // 90 printable characters starting at '!'.
            char::from(b'!' + (state % 90) as u8)
        })
        .collect()
}
