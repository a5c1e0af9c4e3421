use crate::error::StoreResult;
use crate::store::ChunkStore;

/// Chunks on each side of a match when the caller does not say otherwise.
pub const DEFAULT_WINDOW_SIZE: usize = 2;

/// Text of the chunks of `document_id` within `window_size` ordinals of
/// `chunk_id`, ascending, joined by single spaces. An empty window yields "".
pub fn expand(
    store: &dyn ChunkStore,
    chunk_id: u64,
    document_id: &str,
    window_size: usize,
) -> StoreResult<String> {
    let window = window_size as u64;
    let from = chunk_id.saturating_sub(window);
    let to = chunk_id.saturating_add(window);

    let chunks = store.chunks_in_window(document_id, from, to)?;
    Ok(chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Document};
    use crate::store::MemoryStore;

    fn store_with_chunks(n: u64) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_document(Document {
                id: "doc".to_string(),
                original_filename: "doc.pdf".to_string(),
            })
            .unwrap();
        // Insert out of order to make sure the window is sorted.
        let chunks = (0..n)
            .rev()
            .map(|i| Chunk {
                id: i,
                document_id: "doc".to_string(),
                text: format!("c{i}"),
                embedding: vec![1.0],
            })
            .collect();
        store.add_chunks(chunks).unwrap();
        store
    }

    #[test]
    fn test_window_of_two_around_ten() {
        let store = store_with_chunks(21);
        let context = expand(&store, 10, "doc", DEFAULT_WINDOW_SIZE).unwrap();
        assert_eq!(context, "c8 c9 c10 c11 c12");
    }

    #[test]
    fn test_window_saturates_at_start() {
        let store = store_with_chunks(21);
        assert_eq!(expand(&store, 1, "doc", 2).unwrap(), "c0 c1 c2 c3");
    }

    #[test]
    fn test_window_clips_at_end() {
        let store = store_with_chunks(21);
        assert_eq!(expand(&store, 20, "doc", 2).unwrap(), "c18 c19 c20");
    }

    #[test]
    fn test_zero_window_is_the_chunk_itself() {
        let store = store_with_chunks(5);
        assert_eq!(expand(&store, 3, "doc", 0).unwrap(), "c3");
    }

    #[test]
    fn test_empty_window_is_empty_string() {
        let store = store_with_chunks(5);
        assert_eq!(expand(&store, 50, "doc", 2).unwrap(), "");
        assert_eq!(expand(&store, 1, "other", 2).unwrap(), "");
    }
}
