//! Synthesized account details and resource ids.
//!
//! Account rows carry an alias, email and phone that are not derived from the
//! audit data. Values come from a caller-owned RNG so a seeded run is
//! reproducible.

use rand::Rng;

const FIRST_NAMES: &[&str] = &[
    "alex", "blake", "casey", "dana", "drew", "eden", "emery", "finley", "harper", "jamie",
    "jordan", "kai", "logan", "morgan", "parker", "quinn", "reese", "riley", "rowan", "sage",
    "skyler", "taylor",
];

const LAST_NAMES: &[&str] = &[
    "adams", "baker", "carter", "diaz", "ellis", "foster", "garcia", "hayes", "irwin", "jensen",
    "kim", "lopez", "martin", "nguyen", "owens", "patel", "reyes", "shaw", "turner", "walsh",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.net", "example.org"];

/// Fake contact details for an account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub alias: String,
    pub email: String,
    pub phone: String,
}

pub fn account_profile(rng: &mut impl Rng) -> AccountProfile {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let alias = match rng.gen_range(0..3) {
        0 => format!("{first}{last}"),
        1 => format!("{first}.{last}"),
        _ => format!("{}{}{}", &first[..1], last, rng.gen_range(10..100)),
    };
    let email = format!("{first}.{last}@{}", pick(rng, EMAIL_DOMAINS));
    AccountProfile {
        alias,
        email,
        phone: random_phone(rng),
    }
}

/// Random v4 UUID drawn from `rng`.
pub fn resource_id(rng: &mut impl Rng) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

fn random_phone(rng: &mut impl Rng) -> String {
    format!(
        "+1-{}-{:03}-{:04}",
        rng.gen_range(201..=989),
        rng.gen_range(200..=999),
        rng.gen_range(0..=9999)
    )
}

fn pick<'a>(rng: &mut impl Rng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}
