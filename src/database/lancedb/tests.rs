use super::*;

fn sample_chunk(index: u32, total: u32) -> DocumentChunk {
    DocumentChunk {
        text: "To apply, click the Apply button on a job listing.".to_string(),
        metadata: ChunkMetadata {
            id: None,
            source: "applying.md".to_string(),
            file_path: "docs/applying.md".to_string(),
            chunk_index: index,
            total_chunks: total,
            document_type: DocumentType::Markdown,
            processed_at: Utc::now(),
        },
    }
}

#[test]
fn document_type_from_extension() {
    assert_eq!(DocumentType::from_extension("md"), Some(DocumentType::Markdown));
    assert_eq!(
        DocumentType::from_extension("MARKDOWN"),
        Some(DocumentType::Markdown)
    );
    assert_eq!(DocumentType::from_extension("txt"), Some(DocumentType::Text));
    assert_eq!(DocumentType::from_extension("pdf"), None);
}

#[test]
fn document_type_string_forms() {
    for kind in [DocumentType::Markdown, DocumentType::Text] {
        let parsed: DocumentType = kind.as_str().parse().expect("should parse own name");
        assert_eq!(parsed, kind);
    }
    assert!("html".parse::<DocumentType>().is_err());
}

#[test]
fn chunk_validation() {
    assert!(sample_chunk(0, 1).validate().is_ok());
    assert!(sample_chunk(1, 1).validate().is_err());

    let mut blank = sample_chunk(0, 2);
    blank.text = "  \n ".to_string();
    assert!(matches!(blank.validate(), Err(RagError::Validation(_))));

    let mut sourceless = sample_chunk(0, 2);
    sourceless.metadata.source = String::new();
    assert!(sourceless.validate().is_err());
}

#[test]
fn chunk_metadata_serialization() {
    let chunk = sample_chunk(2, 5);
    let json = serde_json::to_value(&chunk.metadata).expect("can serialize json");

    assert_eq!(json["chunkIndex"], 2);
    assert_eq!(json["totalChunks"], 5);
    assert_eq!(json["documentType"], "markdown");
    assert!(json.get("id").is_none());

    let deserialized: ChunkMetadata = serde_json::from_value(json).expect("can parse json");
    assert_eq!(deserialized, chunk.metadata);
}
