/// Source of fresh record keys.
///
/// Any `Fn() -> String` closure is a key generator, which lets tests hand out
/// deterministic keys.
pub trait KeyGenerator: Send + Sync {
    fn next_key(&self) -> String;
}

impl<F> KeyGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_key(&self) -> String {
        self()
    }
}

/// Random (v4) UUID keys, rendered in their hyphenated form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeys;

impl KeyGenerator for UuidKeys {
    fn next_key(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
