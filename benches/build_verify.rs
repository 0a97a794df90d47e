use compact_cert::{
    cert::{commit_participants, Builder, Params, Participant, Verifier},
    schnorr::PrivateKey,
    Sha3, Signer,
};
use criterion::{criterion_group, criterion_main, Criterion};

const MSG: &[u8] = b"hello world";

/// Unit-weight participant sets sharing one vote key, collected to 5/4 of
/// the threshold before building.
fn build_and_verify(c: &mut Criterion) {
    let signer = PrivateKey::from_seed(0);
    let sig = signer.sign(MSG);

    for (n, threshold) in [
        (256u64, 129u64),
        (1024, 513),
        (4096, 2049),
        (256, 171),
        (1024, 683),
        (4096, 2731),
    ] {
        let participants: Vec<_> = (0..n)
            .map(|_| Participant {
                public_key: signer.public_key(),
                weight: 1,
            })
            .collect();
        let party_tree = commit_participants::<Sha3, _>(&participants);
        let party_root = party_tree.root().unwrap();
        let params = Params {
            msg: MSG.to_vec(),
            proven_weight: threshold,
            sec_kq: 128,
        };
        let collect = (5 * threshold / 4).min(n);

        c.bench_function(&format!("build/{n}-{threshold}"), |b| {
            b.iter(|| {
                let mut builder: Builder<_> =
                    Builder::new(params.clone(), participants.clone(), party_tree.clone());
                for position in 0..collect {
                    builder.add_signature(position, sig.clone()).unwrap();
                }
                builder.build().unwrap()
            })
        });

        let mut builder: Builder<_> =
            Builder::new(params.clone(), participants.clone(), party_tree);
        for position in 0..collect {
            builder.add_signature(position, sig.clone()).unwrap();
        }
        let cert = builder.build().unwrap();
        let verifier: Verifier<_> = Verifier::new(params, party_root);

        c.bench_function(&format!("verify/{n}-{threshold}"), |b| {
            b.iter(|| verifier.verify(&cert).unwrap())
        });
    }
}

criterion_group!(benches, build_and_verify);
criterion_main!(benches);
