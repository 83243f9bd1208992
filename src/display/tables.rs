//! Table formatting for search results and collection summaries.

use comfy_table::{Attribute, Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::store::{CollectionInfo, SearchResponse};

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

/// Ranked results with their payloads rendered as compact JSON.
pub fn search_results_table(response: &SearchResponse) -> String {
    let mut table = styled_table(&["#", "Id", "Score", "Payload"]);
    for (rank, result) in response.results.iter().enumerate() {
        let payload = serde_json::to_string(&result.payload).unwrap_or_default();
        table.add_row(vec![
            (rank + 1).to_string(),
            result.id.to_string(),
            format!("{:.4}", result.score.get()),
            payload,
        ]);
    }
    table.to_string()
}

/// Key/value summary of one collection.
pub fn collection_table(info: &CollectionInfo) -> String {
    let meta = &info.meta;
    let mut table = styled_table(&["Property", "Value"]);
    table.add_row(vec!["Name".to_string(), meta.name.clone()]);
    table.add_row(vec!["Vector size".to_string(), meta.vector_size.to_string()]);
    table.add_row(vec![
        "Quantization".to_string(),
        format!(
            "{} dims x {} bits over [{}, {}], depth {}",
            meta.reduced_dimensions,
            meta.bits_per_dimension,
            meta.quantization_range.min,
            meta.quantization_range.max,
            meta.depth_factor
        ),
    ]);
    table.add_row(vec!["Index type".to_string(), meta.index_type.to_string()]);
    table.add_row(vec!["Index status".to_string(), info.index_status.to_string()]);
    if let Some(hnsw) = &meta.hnsw {
        table.add_row(vec![
            "HNSW".to_string(),
            format!(
                "m={} ef_construction={} vectors={}",
                hnsw.m, hnsw.ef_construction, hnsw.vector_count
            ),
        ]);
    }
    table.add_row(vec!["Points".to_string(), info.point_count.to_string()]);
    table.add_row(vec![
        "Indexing".to_string(),
        if info.indexing_open {
            format!("open ({} pending writes)", info.pending_writes)
        } else {
            "closed".to_string()
        },
    ]);
    table.add_row(vec!["Created".to_string(), meta.created_at.clone()]);
    table.add_row(vec!["Updated".to_string(), meta.updated_at.clone()]);
    table.to_string()
}
