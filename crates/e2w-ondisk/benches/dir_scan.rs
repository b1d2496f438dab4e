//! Benchmark: zero-copy lookup vs full parse of a packed directory block.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use e2w_ondisk::{lookup_in_dir_block, parse_dir_block};

/// Build a 4K directory block densely packed with 16-byte entries
/// (names "e000".."e254"), last entry absorbing the slack.
fn make_block() -> Vec<u8> {
    let block_size = 4096_usize;
    let mut block = vec![0_u8; block_size];
    let count = 255_usize;
    let mut offset = 0;
    for i in 0..count {
        let name = format!("e{i:03}");
        let rec_len = if i == count - 1 {
            u16::try_from(block_size - offset).unwrap()
        } else {
            16
        };
        let inode = u32::try_from(i + 11).unwrap();
        block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
        block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
        block[offset + 6] = 4; // name_len
        block[offset + 7] = 1; // regular file
        block[offset + 8..offset + 12].copy_from_slice(name.as_bytes());
        offset += usize::from(rec_len);
    }
    block
}

fn bench_lookup(c: &mut Criterion) {
    let block = make_block();

    let mut group = c.benchmark_group("dir_block");

    group.bench_function("lookup_last_entry", |b| {
        b.iter(|| black_box(lookup_in_dir_block(black_box(&block), b"e254")));
    });

    group.bench_function("lookup_miss", |b| {
        b.iter(|| black_box(lookup_in_dir_block(black_box(&block), b"missing")));
    });

    group.bench_function("parse_all", |b| {
        b.iter(|| black_box(parse_dir_block(black_box(&block))));
    });

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
