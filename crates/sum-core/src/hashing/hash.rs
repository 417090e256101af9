//! Hash helpers – abstracción para permitir cambiar de algoritmo sin tocar
//! el resto del core. SHA-256 en hex minúscula.

use sha2::{Digest, Sha256};

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex_encode(&h.finalize())
}

/// Hashea una secuencia ordenada de partes en bytes. La concatenación es
/// secuencial dentro de un único hasher: el orden de las partes forma parte
/// de la identidad.
pub fn hash_parts<'a, I>(parts: I) -> String
    where I: IntoIterator<Item = &'a [u8]>
{
    let mut h = Sha256::new();
    for part in parts {
        h.update(part);
    }
    hex_encode(&h.finalize())
}

fn hex_encode(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // sha256("abc")
        assert_eq!(hash_str("abc"),
                   "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn parts_concatenation_matches_single_input() {
        assert_eq!(hash_parts([b"ab".as_slice(), b"c".as_slice()]), hash_str("abc"));
    }
}
