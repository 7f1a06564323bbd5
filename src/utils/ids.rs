use chrono::{Datelike, Utc};
use rand::Rng;
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Ticket ids look like `ESP2025-483920`: fest prefix, issue year, six
/// random digits. Collisions are rare but possible and are retried at
/// insert time.
pub fn ticket_id() -> String {
    let year = Utc::now().year();
    let n: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("ESP{year}-{n}")
}

/// Printable QR payload: the ticket id plus a short random suffix so a
/// leaked ticket id alone is not scannable.
pub fn ticket_qr_code(ticket_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{ticket_id}-{}", &suffix[..8])
}

/// `TXN` + last six digits of the epoch millis + up to three random digits.
pub fn transaction_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let n: u32 = rand::thread_rng().gen_range(0..1_000);
    format!("TXN{:06}{}", millis.rem_euclid(1_000_000), n)
}

/// `REF` + six digits from the clock's microsecond component, so a
/// collision retry lands on a fresh id even within one millisecond.
pub fn refund_id() -> String {
    let micros = Utc::now().timestamp_micros();
    format!("REF{:06}", micros.rem_euclid(1_000_000))
}

/// Gate codes carry the tail of the holder's user id, the epoch millis
/// in base36 and five random base36 characters.
pub fn access_code(user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    let start = chars.len().saturating_sub(6);
    let tail: String = chars[start..].iter().collect();

    let ts = to_base36(Utc::now().timestamp_millis() as u64);

    let mut rng = rand::thread_rng();
    let salt: String = (0..5)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();

    format!("{tail}-{ts}-{salt}")
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(CODE_ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_id_format() {
        let id = ticket_id();
        let year = Utc::now().year();
        let (prefix, digits) = id.split_at(format!("ESP{year}-").len());
        assert_eq!(prefix, format!("ESP{year}-"));
        let n: u32 = digits.parse().unwrap();
        assert!((100_000..1_000_000).contains(&n), "suffix out of range: {n}");
    }

    #[test]
    fn qr_code_extends_ticket_id() {
        let id = ticket_id();
        let qr = ticket_qr_code(&id);
        assert!(qr.starts_with(&format!("{id}-")));
        let suffix = &qr[id.len() + 1..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn transaction_id_format() {
        let id = transaction_id();
        assert!(id.starts_with("TXN"));
        assert!((10..=12).contains(&id.len()), "unexpected length: {id}");
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn refund_id_format() {
        let id = refund_id();
        assert!(id.starts_with("REF"));
        assert_eq!(id.len(), 9);
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn access_code_carries_user_tail() {
        let code = access_code("user_0123abc456");
        let parts: Vec<&str> = code.rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], "abc456");
        assert_eq!(parts[0].len(), 5);
        assert!(parts[0].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!parts[1].is_empty());
    }

    #[test]
    fn access_code_handles_short_user_id() {
        let code = access_code("u1");
        assert!(code.starts_with("u1-"));
    }

    #[test]
    fn base36_round_numbers() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
