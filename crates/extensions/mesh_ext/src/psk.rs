//! Meshtastic channel-PSK decryption: AES-CTR keyed by the channel's
//! pre-shared key, nonce built from the packet id and sender node number.
use crate::error::MeshError;
use aes::cipher::KeyIvInit;
use aes::cipher::StreamCipher;
use aes::Aes128;
use aes::Aes256;
use ctr::Ctr128BE;

fn nonce(packet_id: u32, from: u32) -> [u8; 16] {
    let mut nonce = [0u8; 16];
    nonce[0..4].copy_from_slice(&packet_id.to_le_bytes());
    nonce[8..12].copy_from_slice(&from.to_le_bytes());
    nonce
}

/// Decrypts (or encrypts, CTR is symmetric) `data` in place against the
/// channel PSK. Accepts 16-byte (AES-128) and 32-byte (AES-256) keys, the
/// two sizes Meshtastic channels are configured with.
pub fn apply_keystream(psk: &[u8], packet_id: u32, from: u32, data: &mut [u8]) -> Result<(), MeshError> {
    let nonce = nonce(packet_id, from);
    match psk.len() {
        16 => {
            let mut cipher = Ctr128BE::<Aes128>::new_from_slices(psk, &nonce)
                .map_err(|error| MeshError::Decrypt(error.to_string()))?;
            cipher.apply_keystream(data);
        }
        32 => {
            let mut cipher = Ctr128BE::<Aes256>::new_from_slices(psk, &nonce)
                .map_err(|error| MeshError::Decrypt(error.to_string()))?;
            cipher.apply_keystream(data);
        }
        other => return Err(MeshError::Decrypt(format!("unsupported PSK length {other} bytes"))),
    }
    Ok(())
}

pub fn decrypt(psk: &[u8], packet_id: u32, from: u32, ciphertext: &[u8]) -> Result<Vec<u8>, MeshError> {
    let mut buffer = ciphertext.to_vec();
    apply_keystream(psk, packet_id, from, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctr_is_its_own_inverse() {
        let psk = [7u8; 16];
        let plaintext = b"hello from the mesh";
        let mut buffer = plaintext.to_vec();
        apply_keystream(&psk, 0x1111, 0xae614908, &mut buffer).unwrap();
        assert_ne!(buffer, plaintext);
        apply_keystream(&psk, 0x1111, 0xae614908, &mut buffer).unwrap();
        assert_eq!(buffer, plaintext);
    }

    #[test]
    fn rejects_unsupported_key_length() {
        let psk = [1u8; 24];
        let result = apply_keystream(&psk, 1, 1, &mut [0u8; 4]);
        assert!(result.is_err());
    }
}
