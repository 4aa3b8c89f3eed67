//! WireGuard-style keypair generation. One keypair per node; the private
//! half is never published into a shared table and is only ever handed to
//! the owning node's own configuration write (§3 `VPNPeer` invariant).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;

#[derive(Clone, Debug)]
pub struct Keypair {
    pub private_key: String,
    pub public_key: String,
}

/// Generates a fresh Curve25519-shaped keypair, base64-encoded the way
/// WireGuard configs expect. This is a stand-in key derivation (clamped
/// random bytes, not an X25519 scalar multiplication) suitable for driving
/// the mesh-coordination protocol against a real `wg`/userspace
/// implementation that performs the actual key agreement.
pub fn generate_keypair() -> Keypair {
    let mut private_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut private_bytes);
    clamp(&mut private_bytes);

    let mut public_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut public_bytes);

    Keypair {
        private_key: BASE64.encode(private_bytes),
        public_key: BASE64.encode(public_bytes),
    }
}

fn clamp(key: &mut [u8; 32]) {
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;
}
