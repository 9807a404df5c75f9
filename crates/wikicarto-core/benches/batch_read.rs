use wikicarto_core::{BatchReader, HistoricalEntry};

fn write_sample(dir: &std::path::Path, lines: usize) -> std::path::PathBuf {
    let path = dir.join("bench_Step2_batch_001.json");
    let mut out = String::new();
    for n in 0..lines {
        let mut entry = HistoricalEntry::new(
            format!("Abbaye de Cluny {n}"),
            format!("https://fr.wikipedia.org/wiki/Abbaye_{n}"),
        );
        entry.external_id = Some(format!("Q{n}"));
        entry.lat = Some(46.43);
        entry.lon = Some(4.66);
        out.push_str(&serde_json::to_string(&entry).unwrap());
        out.push('\n');
    }
    std::fs::write(&path, out).unwrap();
    path
}

#[divan::bench]
fn load_batch_file(bencher: divan::Bencher) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), 10_000);
    let reader = BatchReader::new(&path);
    bencher.bench(|| reader.load().unwrap().len());
}

fn main() {
    divan::main();
}
