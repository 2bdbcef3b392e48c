//! Generates a VAPID key pair and prints the environment lines to configure it.
//!
//! ```text
//! cargo run -p critterkeep-push --bin vapidgen -- mailto:keeper@example.com
//! ```

use critterkeep_push::generate_keys;

fn main() {
    let subject = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mailto:admin@example.com".to_string());
    let keys = generate_keys();

    println!("# Web Push (VAPID) keys. Keep the private key out of version control.");
    println!("CRITTERKEEP__PUSH__VAPID_PUBLIC_KEY={}", keys.public_key);
    println!("CRITTERKEEP_SECRET_PUSH_VAPID_PRIVATE_KEY={}", keys.private_key);
    println!("CRITTERKEEP__PUSH__VAPID_SUBJECT={}", subject);
}
