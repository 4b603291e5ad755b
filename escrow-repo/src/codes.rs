//! Short human-readable codes for users, transactions and shops.

use rand::Rng;

const ALPHABET: &[u8] = b"1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_LEN: usize = 6;

pub const TRANSACTION_PREFIX: &str = "ESGH-";
pub const SHOP_PREFIX: &str = "SHOP-";

fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Six characters, e.g. `7K2Q9A`.
pub fn user_code() -> String {
    random_code()
}

/// e.g. `ESGH-4F7K2Q`.
pub fn transaction_code() -> String {
    format!("{}{}", TRANSACTION_PREFIX, random_code())
}

/// e.g. `SHOP-X81B0C`.
pub fn shop_code() -> String {
    format!("{}{}", SHOP_PREFIX, random_code())
}
