use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use hashnest::{
    Context, CostBounds, CostMetric, CostParams, Digest, Handler, HashError, HashOptions,
    HashRecord, ParamSpec, Pbkdf2Backend, Policy, Registry, SaltSpec, SchemeDescriptor,
    crypto::pbkdf2_hmac,
    format::{self, AB64},
};
use sha2::{Digest as _, Sha256};

fn cheap_policy() -> Policy {
    Policy::new([
        "pbkdf2_sha256",
        "pbkdf2_sha512",
        "bcrypt",
        "argon2",
        "pbkdf2_sha1",
        "sha1_crypt",
    ])
    .with_deprecated(["pbkdf2_sha1", "sha1_crypt"])
    .with_default_cost("pbkdf2_sha256", "rounds", 1000)
    .with_default_cost("pbkdf2_sha512", "rounds", 1000)
    .with_default_cost("pbkdf2_sha1", "rounds", 1000)
    .with_default_cost("sha1_crypt", "rounds", 1000)
    .with_default_cost("bcrypt", "rounds", 4)
    .with_default_cost("argon2", "rounds", 1)
    .with_default_cost("argon2", "memory_cost", 64)
}

fn min_elapsed(runs: usize, mut f: impl FnMut()) -> Duration {
    (0..runs)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .min()
        .unwrap_or_default()
}

#[test]
fn pbkdf2_golden_vectors() {
    let sha1 = pbkdf2_hmac(Digest::Sha1, b"abracadabra", b"open sesame", 10240, 20).unwrap();
    assert_eq!(hex::encode(sha1), "e45ce658e79b16107a418ad4634836f5f0601ad1");

    let sha256 = pbkdf2_hmac(Digest::Sha256, b"abracadabra", b"open sesame", 10240, 32).unwrap();
    assert_eq!(
        hex::encode(sha256),
        "fadef97054306c93c55213cd57111d6c0791735dcdde8ac32f9f934b49c5af1e"
    );
}

#[test]
fn every_scheme_round_trips() {
    let ctx = Context::new(cheap_policy()).unwrap();
    for scheme in ctx.schemes() {
        let hash = ctx
            .hash_with("correct horse", Some(scheme), &HashOptions::new())
            .unwrap();
        assert_eq!(ctx.identify(&hash).unwrap(), scheme);
        assert!(ctx.verify("correct horse", &hash).unwrap(), "{hash}");
        assert!(!ctx.verify("correct horse!", &hash).unwrap(), "{hash}");

        let handler = ctx.handler(scheme).unwrap();
        let record = handler.from_string(&hash).unwrap();
        assert_eq!(handler.to_string(&record), hash);
    }
}

#[test]
fn fresh_records_survive_render_and_parse() {
    let ctx = Context::new(cheap_policy()).unwrap();
    for scheme in ctx.schemes() {
        let handler = ctx.handler(scheme).unwrap();
        let limits = ctx.limits(scheme).unwrap();
        let record = handler
            .hash_within(b"correct horse", &HashOptions::new(), limits)
            .unwrap();
        assert_eq!(record.scheme(), scheme);

        let hash = handler.to_string(&record);
        assert_eq!(handler.from_string(&hash).unwrap(), record, "{hash}");
        let outdated = scheme != ctx.default_scheme();
        assert_eq!(ctx.needs_update(&hash).unwrap(), outdated, "{hash}");
    }
}

#[test]
fn salts_are_random() {
    let ctx = Context::new(cheap_policy()).unwrap();
    assert_ne!(ctx.hash("pw").unwrap(), ctx.hash("pw").unwrap());
}

#[test]
fn empty_and_unicode_secrets() {
    let ctx = Context::new(cheap_policy()).unwrap();
    for secret in ["", "pässwörd", "密码"] {
        let hash = ctx.hash(secret).unwrap();
        assert!(ctx.verify(secret, &hash).unwrap());
    }
}

#[test]
fn reference_hashes_verify_through_context() {
    let ctx = Context::new(cheap_policy()).unwrap();
    let cases = [
        (
            "password",
            "$pbkdf2-sha256$1212$4vjV83LKPjQzk31VI4E0Vw$hsYF68OiOUPdDZ1Fg.fJPeq1h/gXXY7acBp9/6c.tmQ",
        ),
        ("password", "$pbkdf2$1000$AQIDBAUGBwg$7RtaQ9OoZQTdE8nadga9NV0lmTw"),
        ("password", "$sha1$21773$uV7PTeux$I9oHnvwPZHMO0Nq6/WgyGV/tDJIH"),
        ("U*U", "$2b$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW"),
    ];
    for (secret, hash) in cases {
        assert!(ctx.verify(secret, hash).unwrap(), "{hash}");
        assert!(ctx.needs_update(hash).unwrap(), "{hash}");
    }
}

#[test]
fn malformed_hashes_are_errors_not_mismatches() {
    let ctx = Context::new(cheap_policy()).unwrap();
    let bad = [
        "$pbkdf2-sha256$",
        "$pbkdf2-sha256$1000$$",
        "$pbkdf2-sha256$abc$AAAA$AAAA",
        "$2b$04$short",
        "$sha1$1000$salt",
        "$argon2id$v=19$m=64,t=1$AAAAAAAAAAA$AAAA",
    ];
    for hash in bad {
        assert!(
            matches!(ctx.verify("pw", hash), Err(HashError::MalformedHash(_))),
            "{hash}"
        );
        assert!(
            matches!(ctx.needs_update(hash), Err(HashError::MalformedHash(_))),
            "{hash}"
        );
    }
}

#[test]
fn migration_from_deprecated_scheme() {
    let legacy = Context::new(
        Policy::new(["sha1_crypt"]).with_default_cost("sha1_crypt", "rounds", 1000),
    )
    .unwrap();
    let old = legacy.hash("pw").unwrap();

    let ctx = Context::new(cheap_policy()).unwrap();
    assert!(ctx.needs_update(&old).unwrap());
    let (ok, new) = ctx.verify_and_update("pw", &old).unwrap();
    assert!(ok);
    let new = new.unwrap();
    assert_eq!(ctx.identify(&new).unwrap(), "pbkdf2_sha256");
    assert!(!ctx.needs_update(&new).unwrap());
    assert_eq!(ctx.verify_and_update("wrong", &old).unwrap(), (false, None));
}

#[test]
fn raising_default_cost_flags_old_hashes() {
    let ctx = Context::new(cheap_policy()).unwrap();
    let hash = ctx.hash("pw").unwrap();
    assert!(!ctx.needs_update(&hash).unwrap());

    let stronger = ctx
        .copy_with(cheap_policy().with_default_cost("pbkdf2_sha256", "rounds", 2000))
        .unwrap();
    assert!(stronger.needs_update(&hash).unwrap());
    let (_, new) = stronger.verify_and_update("pw", &hash).unwrap();
    assert!(new.unwrap().starts_with("$pbkdf2-sha256$2000$"));
}

#[test]
fn schemes_outside_policy_are_rejected() {
    let ctx = Context::new(Policy::new(["bcrypt"]).with_default_cost("bcrypt", "rounds", 4))
        .unwrap();
    let hash = "$pbkdf2$1000$AQIDBAUGBwg$7RtaQ9OoZQTdE8nadga9NV0lmTw";
    assert_eq!(
        ctx.verify("password", hash).unwrap_err(),
        HashError::UnknownScheme("pbkdf2_sha1".into())
    );
    assert!(matches!(
        ctx.hash_with("pw", Some("pbkdf2_sha1"), &HashOptions::new()),
        Err(HashError::UnknownScheme(_))
    ));
    assert!(matches!(
        ctx.verify("pw", "plaintext"),
        Err(HashError::UnknownScheme(_))
    ));
}

#[test]
fn clamping_respects_policy_bounds() {
    let policy = cheap_policy().with_cost(
        "pbkdf2_sha256",
        "rounds",
        CostBounds::new(Some(500), Some(1500), Some(1000)),
    );
    let ctx = Context::new(policy).unwrap();

    let err = ctx
        .hash_with("pw", None, &HashOptions::new().rounds(100))
        .unwrap_err();
    assert_eq!(
        err,
        HashError::InvalidCost {
            scheme: "pbkdf2_sha256".into(),
            param: "rounds".into(),
            value: 100,
            min: 500,
            max: 1500,
        }
    );

    let hash = ctx
        .hash_with("pw", None, &HashOptions::new().rounds(100).clamp(true))
        .unwrap();
    assert!(hash.starts_with("$pbkdf2-sha256$500$"));
}

#[test]
fn builtin_backend_matches_default_backend() {
    let builtin = Arc::new(Registry::with_builtins(Pbkdf2Backend::Builtin).unwrap());
    let a = Context::with_registry(cheap_policy(), builtin).unwrap();
    let b = Context::new(cheap_policy()).unwrap();

    for scheme in ["pbkdf2_sha1", "pbkdf2_sha256", "pbkdf2_sha512"] {
        let opts = HashOptions::new().salt(*b"fixed salt bytes");
        assert_eq!(
            a.hash_with("pw", Some(scheme), &opts).unwrap(),
            b.hash_with("pw", Some(scheme), &opts).unwrap()
        );
    }
}

// Iterated SHA-256 over salt || secret, stored as `$demo$<rounds>$<salt>$<checksum>`.
static DEMO: SchemeDescriptor = SchemeDescriptor {
    name: "demo_sha256",
    ident: "$demo$",
    cost_metric: CostMetric::Linear,
    params: &[ParamSpec::new("rounds", 1, 10_000, 100)],
    salt: SaltSpec::new(4, 32, 8),
    checksum_size: 32,
};

#[derive(Debug)]
struct DemoHandler;

impl Handler for DemoHandler {
    fn descriptor(&self) -> &SchemeDescriptor {
        &DEMO
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let rest = format::strip_ident(DEMO.name, DEMO.ident, hash)?;
        let [rounds, salt, checksum] = format::split_fields::<3>(DEMO.name, rest)?;
        let rounds = format::parse_decimal(DEMO.name, rounds)?;
        self.parsed(
            CostParams::new().with("rounds", rounds),
            format::decode(&AB64, DEMO.name, salt)?,
            format::decode(&AB64, DEMO.name, checksum)?,
        )
    }

    fn to_string(&self, record: &HashRecord) -> String {
        format!(
            "{}{}${}${}",
            DEMO.ident,
            record.costs().get("rounds").unwrap_or_default(),
            format::encode(&AB64, record.salt()),
            format::encode(&AB64, record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let rounds = costs.require(DEMO.name, "rounds")?;
        let mut digest = Sha256::new_with_prefix(salt).chain_update(secret).finalize();
        for _ in 1..rounds {
            digest = Sha256::digest(digest);
        }
        Ok(digest.to_vec())
    }
}

#[test]
fn custom_scheme_plugs_in() {
    let mut registry = Registry::with_builtins(Pbkdf2Backend::default()).unwrap();
    registry.register(DemoHandler).unwrap();

    let policy = Policy::new(["demo_sha256", "pbkdf2_sha256"])
        .with_default_cost("pbkdf2_sha256", "rounds", 1000);
    let ctx = Context::with_registry(policy, Arc::new(registry)).unwrap();

    let hash = ctx.hash("pw").unwrap();
    assert!(hash.starts_with("$demo$100$"), "{hash}");
    assert!(ctx.verify("pw", &hash).unwrap());
    assert!(!ctx.verify("pW", &hash).unwrap());
    assert!(!ctx.needs_update(&hash).unwrap());

    let weak = ctx
        .hash_with("pw", None, &HashOptions::new().rounds(5))
        .unwrap();
    assert!(ctx.needs_update(&weak).unwrap());
}

// Two costs, stored width first: `$wide$<width>$<rounds>$<salt>$<checksum>`.
static WIDE: SchemeDescriptor = SchemeDescriptor {
    name: "wide",
    ident: "$wide$",
    cost_metric: CostMetric::Linear,
    params: &[
        ParamSpec::new("rounds", 1, 100, 7),
        ParamSpec::new("width", 1, 16, 3),
    ],
    salt: SaltSpec::fixed(4),
    checksum_size: 4,
};

#[derive(Debug)]
struct WideHandler;

impl Handler for WideHandler {
    fn descriptor(&self) -> &SchemeDescriptor {
        &WIDE
    }

    fn from_string(&self, hash: &str) -> Result<HashRecord, HashError> {
        let rest = format::strip_ident(WIDE.name, WIDE.ident, hash)?;
        let [width, rounds, salt, checksum] = format::split_fields::<4>(WIDE.name, rest)?;
        let costs = CostParams::new()
            .with("width", format::parse_decimal(WIDE.name, width)?)
            .with("rounds", format::parse_decimal(WIDE.name, rounds)?);
        self.parsed(
            costs,
            format::decode(&AB64, WIDE.name, salt)?,
            format::decode(&AB64, WIDE.name, checksum)?,
        )
    }

    fn to_string(&self, record: &HashRecord) -> String {
        let costs = record.costs();
        format!(
            "{}{}${}${}${}",
            WIDE.ident,
            costs.get("width").unwrap_or_default(),
            costs.get("rounds").unwrap_or_default(),
            format::encode(&AB64, record.salt()),
            format::encode(&AB64, record.checksum()),
        )
    }

    fn derive_checksum(
        &self,
        secret: &[u8],
        salt: &[u8],
        costs: &CostParams,
    ) -> Result<Vec<u8>, HashError> {
        let rounds = costs.require(WIDE.name, "rounds")?;
        let width = costs.require(WIDE.name, "width")?;
        let mut digest = Sha256::new_with_prefix(salt)
            .chain_update(secret)
            .chain_update(width.to_be_bytes())
            .finalize();
        for _ in 1..rounds {
            digest = Sha256::digest(digest);
        }
        Ok(digest[..WIDE.checksum_size].to_vec())
    }
}

#[test]
fn cost_order_in_hash_string_does_not_matter() {
    let mut registry = Registry::with_builtins(Pbkdf2Backend::default()).unwrap();
    registry.register(WideHandler).unwrap();
    let ctx = Context::with_registry(Policy::new(["wide"]), Arc::new(registry)).unwrap();

    let hash = ctx.hash("pw").unwrap();
    assert!(hash.starts_with("$wide$3$7$"), "{hash}");
    assert!(!ctx.needs_update(&hash).unwrap());
    assert_eq!(ctx.verify_and_update("pw", &hash).unwrap(), (true, None));

    let record = WideHandler.from_string(&hash).unwrap();
    assert_eq!(record.costs().to_string(), "rounds=7, width=3");
    assert_eq!(WideHandler.from_string(&WideHandler.to_string(&record)).unwrap(), record);

    let narrow = ctx
        .hash_with("pw", None, &HashOptions::new().cost("width", 2))
        .unwrap();
    assert!(ctx.needs_update(&narrow).unwrap());
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = Registry::with_builtins(Pbkdf2Backend::default()).unwrap();
    registry.register(DemoHandler).unwrap();
    assert!(matches!(
        registry.register(DemoHandler),
        Err(HashError::DuplicateIdentifier(_))
    ));
}

#[test]
fn context_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Context>();
    assert_send_sync::<Registry>();

    let ctx = Arc::new(Context::new(cheap_policy()).unwrap());
    let hash = Arc::new(ctx.hash("shared").unwrap());

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            let hash = Arc::clone(&hash);
            thread::spawn(move || {
                assert!(ctx.verify("shared", &hash).unwrap());
                assert!(!ctx.dummy_verify().unwrap());
                let own = ctx.hash(format!("secret {i}")).unwrap();
                assert!(ctx.verify(format!("secret {i}"), &own).unwrap());
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn each_log2_step_doubles_work() {
    let ctx = Context::new(cheap_policy()).unwrap();
    let bcrypt = |rounds| {
        ctx.hash_with("pw", Some("bcrypt"), &HashOptions::new().rounds(rounds))
            .unwrap()
    };
    let (four, six) = (bcrypt(4), bcrypt(6));

    let t4 = min_elapsed(5, || {
        ctx.verify("pw", &four).unwrap();
    });
    let t6 = min_elapsed(5, || {
        ctx.verify("pw", &six).unwrap();
    });
    // two steps: ideally 4x, allow for fixed setup cost and noise
    let ratio = t6.as_secs_f64() / t4.as_secs_f64();
    assert!(ratio > 2.0, "ratio {ratio}");
}

#[test]
fn higher_cost_takes_longer() {
    let ctx = Context::new(cheap_policy()).unwrap();
    let low = ctx
        .hash_with("pw", None, &HashOptions::new().rounds(1_000))
        .unwrap();
    let high = ctx
        .hash_with("pw", None, &HashOptions::new().rounds(50_000))
        .unwrap();

    let low_time = min_elapsed(5, || {
        ctx.verify("pw", &low).unwrap();
    });
    let high_time = min_elapsed(5, || {
        ctx.verify("pw", &high).unwrap();
    });
    assert!(high_time > low_time, "{high_time:?} <= {low_time:?}");
}

fn dummy_context(rounds: u32) -> (Context, String) {
    let ctx = Context::new(cheap_policy().with_default_cost("pbkdf2_sha256", "rounds", rounds))
        .unwrap();
    let hash = ctx.hash("real secret").unwrap();
    // first call builds the dummy hash
    assert!(!ctx.dummy_verify().unwrap());
    (ctx, hash)
}

fn average_elapsed(runs: u32, mut f: impl FnMut()) -> Duration {
    let start = Instant::now();
    for _ in 0..runs {
        f();
    }
    start.elapsed() / runs
}

#[test]
fn dummy_verify_costs_about_one_verify() {
    let (ctx, hash) = dummy_context(20_000);
    let real = min_elapsed(7, || {
        ctx.verify("wrong secret", &hash).unwrap();
    });
    let dummy = min_elapsed(7, || {
        assert!(!ctx.dummy_verify().unwrap());
    });
    let ratio = dummy.as_secs_f64() / real.as_secs_f64();
    assert!((0.5..=2.0).contains(&ratio), "ratio {ratio}");
}

#[test]
#[ignore = "timing sensitive"]
fn dummy_verify_within_twenty_percent() {
    let (ctx, hash) = dummy_context(5_000);
    let dummy = average_elapsed(100, || {
        ctx.dummy_verify().unwrap();
    });
    for secret in ["real secret", "wrong secret"] {
        let real = average_elapsed(100, || {
            ctx.verify(secret, &hash).unwrap();
        });
        let ratio = dummy.as_secs_f64() / real.as_secs_f64();
        assert!((0.8..=1.2).contains(&ratio), "{secret}: ratio {ratio}");
    }
}
