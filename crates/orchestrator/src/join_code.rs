use uuid::Uuid;

/// Characters that survive being read aloud: no 0/O or 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const JOIN_CODE_LEN: usize = 8;

pub trait JoinCodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Random codes drawn from v4 UUID bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJoinCodes;

impl JoinCodeSource for RandomJoinCodes {
    fn next_code(&self) -> String {
        Uuid::new_v4()
            .as_bytes()
            .iter()
            .take(JOIN_CODE_LEN)
            .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
            .collect()
    }
}
