use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use serde_edn::{compact, from_str, pprint, to_string, PPrintOpts, Value};

#[derive(Serialize, Deserialize, Clone)]
struct Animal {
    name: String,
    #[serde(rename = "kind")]
    species: String,
}

#[derive(Serialize, Deserialize, Clone)]
struct Person {
    name: String,
    #[serde(rename = "born")]
    birthyear: i32,
    pets: Vec<Animal>,
}

fn sample_person() -> Person {
    Person {
        name: "Hans".to_string(),
        birthyear: 1970,
        pets: vec![
            Animal {
                name: "Cap'n Jack".to_string(),
                species: "Sparrow".to_string(),
            },
            Animal {
                name: "Freddy".to_string(),
                species: "Cockatiel".to_string(),
            },
        ],
    }
}

fn sample_edn() -> String {
    let people: Vec<Person> = (0..50).map(|_| sample_person()).collect();
    to_string(&people).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let person = sample_person();
    c.bench_function("encode_struct", |b| {
        b.iter(|| to_string(black_box(&person)).unwrap())
    });

    let people: Vec<Person> = (0..50).map(|_| sample_person()).collect();
    c.bench_function("encode_vec_of_structs", |b| {
        b.iter(|| to_string(black_box(&people)).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let text = to_string(&sample_person()).unwrap();
    c.bench_function("decode_struct", |b| {
        b.iter(|| from_str::<Person>(black_box(&text)).unwrap())
    });

    let stream = sample_edn();
    c.bench_function("decode_into_value", |b| {
        b.iter(|| from_str::<Value>(black_box(&stream)).unwrap())
    });
}

fn bench_reserialize(c: &mut Criterion) {
    let stream = sample_edn();
    c.bench_function("compact", |b| {
        b.iter(|| compact(black_box(stream.as_bytes())).unwrap())
    });
    c.bench_function("pprint", |b| {
        b.iter(|| pprint(black_box(stream.as_bytes()), &PPrintOpts::default()).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_reserialize);
criterion_main!(benches);
