use criterion::{Criterion, criterion_group, criterion_main};
use docs_rag::embeddings::chunking::{ChunkingConfig, TextSegmenter};
use docs_rag::indexer::markdown_to_text;
use std::hint::black_box;

fn help_center_markdown() -> String {
    (1..=60)
        .map(|section| {
            format!(
                "## Section {section}\n\nTo apply, click the **Apply** button on a [job listing](/jobs). \
                 Recruiters review applications in the order they arrive! Can you withdraw later? \
                 Yes: open My Jobs and choose Withdraw.\n\n- Keep your resume current\n- List your skills\n\n\
                 ```text\nignored code sample {section}\n```\n"
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let markdown = help_center_markdown();
    let text = markdown_to_text(&markdown);
    let segmenter =
        TextSegmenter::from_config(&ChunkingConfig::default()).expect("default config is valid");
    let unbroken = "x".repeat(20_000);

    c.bench_function("markdown_to_text", |b| {
        b.iter(|| markdown_to_text(black_box(&markdown)))
    });
    c.bench_function("split_prose", |b| {
        b.iter(|| segmenter.split(black_box(&text)))
    });
    c.bench_function("split_unbroken", |b| {
        b.iter(|| segmenter.split(black_box(&unbroken)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
