use criterion::{Criterion, black_box, criterion_group, criterion_main};

use dxdaily::api::decoder::Utf8ChunkDecoder;
use dxdaily::session::stream::StreamParser;

/// A long reply with bold runs, an ordered lab panel and a verdict, as the
/// server would stream it.
fn make_reply(segments: usize) -> String {
    let mut reply = String::new();
    for i in 0..segments {
        if i % 5 == 0 {
            reply.push_str("$$$ **CBC**: WBC 11.2, Hb 13.1, Plt 240");
        } else {
            reply.push_str("The pain started about **three days** ago and gets worse at night");
        }
        reply.push_str("\n\n\n");
    }
    reply.push_str("%%% You got it, well done.");
    reply
}

fn chunked(reply: &str, size: usize) -> Vec<String> {
    let mut decoder = Utf8ChunkDecoder::new();
    let mut chunks: Vec<String> = reply
        .as_bytes()
        .chunks(size)
        .map(|bytes| decoder.decode(bytes))
        .collect();
    chunks.push(decoder.finish());
    chunks
}

fn bench_push_chunks(c: &mut Criterion) {
    let reply = make_reply(40);
    let small = chunked(&reply, 16);
    let large = chunked(&reply, 1024);

    c.bench_function("stream_parser 40 segments (16-byte chunks)", |b| {
        b.iter(|| {
            let mut parser = StreamParser::new();
            for chunk in &small {
                parser.push_chunk(black_box(chunk), false);
            }
            parser.finish()
        })
    });

    c.bench_function("stream_parser 40 segments (1 KiB chunks)", |b| {
        b.iter(|| {
            let mut parser = StreamParser::new();
            for chunk in &large {
                parser.push_chunk(black_box(chunk), false);
            }
            parser.finish()
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let reply = make_reply(40).replace("three", "trois résumé");
    let bytes = reply.into_bytes();

    c.bench_function("utf8 decode (7-byte reads)", |b| {
        b.iter(|| {
            let mut decoder = Utf8ChunkDecoder::new();
            let mut total = 0;
            for piece in bytes.chunks(7) {
                total += decoder.decode(black_box(piece)).len();
            }
            total + decoder.finish().len()
        })
    });
}

criterion_group!(benches, bench_push_chunks, bench_decode);
criterion_main!(benches);
