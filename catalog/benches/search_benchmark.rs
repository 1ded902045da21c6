use catalog_search::{tokenize, CatalogStore, ItemFields};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;
use tempfile::TempDir;

const NUM_ITEMS: usize = 5_000;

const BRANDS: &[&str] = &["Coca", "Pepsi", "Mountain", "Sprite", "Fanta", "Dasani", "Lays", "Doritos"];
const NOUNS: &[&str] = &["Cola", "Dew", "Water", "Chips", "Classic", "Zero", "Cherry", "Lime"];
const SIZES: &[&str] = &["12oz", "20oz", "2L", "1L", "6pk", "24pk"];
const CATEGORIES: &[&str] = &["Beverages", "Snacks", "Grocery", "Frozen"];

fn pick<'a>(rng: &mut impl Rng, words: &[&'a str]) -> &'a str {
    words[rng.gen_range(0..words.len())]
}

fn random_item(rng: &mut impl Rng, n: usize) -> ItemFields {
    let description = format!(
        "{} {} {}",
        pick(rng, BRANDS),
        pick(rng, NOUNS),
        pick(rng, SIZES),
    );
    ItemFields {
        description: Some(description),
        category: Some(pick(rng, CATEGORIES).to_string()),
        item_number: Some(format!("{}", 1000 + n)),
        upc_retail: Some(format!("{:012}", rng.gen_range(0..999_999_999_999u64))),
        upc_case: None,
    }
}

fn setup_store() -> (CatalogStore, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("bench.sqlite").to_string_lossy().to_string();
    let store = CatalogStore::new(db_path).expect("Failed to open bench database");

    let mut rng = rand::thread_rng();
    let items: Vec<ItemFields> = (0..NUM_ITEMS).map(|n| random_item(&mut rng, n)).collect();
    for chunk in items.chunks(500) {
        store.import_batch(chunk.to_vec()).expect("import");
    }
    (store, temp_dir)
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_item", |b| {
        b.iter(|| tokenize(&["Coca Cola Classic 12oz", "Beverages", "4001", "049000001234"]))
    });
}

fn bench_search(c: &mut Criterion) {
    let (store, _temp) = setup_store();
    let rt = tokio::runtime::Runtime::new().unwrap();

    let queries = vec![
        ("single_char", "c"),
        ("word", "cola"),
        ("inner_substring", "ola"),
        ("multi_word", "coca cola 12oz"),
        ("item_number", "1234"),
        ("no_match", "zzzz"),
    ];

    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for (name, query) in queries {
        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    store.search(query.to_string()).await.unwrap()
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
