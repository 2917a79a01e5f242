use getrandom::fill;

use crate::error::HashError;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<(), HashError> {
    fill(buf).map_err(|e| HashError::Backend(format!("OS random generator unavailable: {e}")))
}

/// Generate `len` random bytes
pub fn random_bytes(len: usize) -> Result<Vec<u8>, HashError> {
    let mut buf = vec![0u8; len];
    secure_random(&mut buf)?;
    Ok(buf)
}

/// Generate `len` characters drawn uniformly from `alphabet`.
///
/// Bytes that would bias the distribution are rejected and redrawn.
pub fn random_chars(alphabet: &[u8], len: usize) -> Result<Vec<u8>, HashError> {
    if alphabet.is_empty() || alphabet.len() > 256 {
        return Err(HashError::Backend(format!(
            "alphabet size {} not in 1..=256",
            alphabet.len()
        )));
    }

    let n = alphabet.len();
    let limit = 256 - (256 % n);
    let mut out = Vec::with_capacity(len);
    let mut pool = [0u8; 64];

    while out.len() < len {
        secure_random(&mut pool)?;
        for &b in pool.iter() {
            if (b as usize) < limit {
                out.push(alphabet[b as usize % n]);
                if out.len() == len {
                    break;
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_have_requested_length_and_differ() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn random_chars_stay_in_alphabet() {
        let alphabet = b"abc";
        let chars = random_chars(alphabet, 500).unwrap();
        assert_eq!(chars.len(), 500);
        assert!(chars.iter().all(|c| alphabet.contains(c)));
    }

    #[test]
    fn empty_alphabet_fails() {
        assert!(random_chars(b"", 4).is_err());
    }
}
