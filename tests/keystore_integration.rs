//! Static key persistence feeding a live handshake

use std::sync::Arc;

use crypto::ow_chcca::OwChCca16;
use crypto::Kem;
use rand::rngs::OsRng;
use timke::{KeyStore, TimkeClient, TimkeConfig, TimkeServer};

#[test]
fn test_persisted_keys_complete_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.key");
    let config = TimkeConfig::new(Arc::new(OwChCca16::new()), Arc::new(OwChCca16::new()));

    let (generated_pk, _) = KeyStore::generate(config.kem1.as_ref(), &path, &mut OsRng).unwrap();

    // Both ends reload from disk, as separate processes would.
    let sk = KeyStore::load_private_key(config.kem1.as_ref(), &path).unwrap();
    let pk = KeyStore::load_public_key(config.kem1.as_ref(), &KeyStore::public_key_path(&path))
        .unwrap();
    assert_eq!(pk, generated_pk);

    let mut client = TimkeClient::new(config.clone(), pk).unwrap();
    let mut server = TimkeServer::new(config, sk);

    let hello = client.generate_client_hello(Some(b"from disk")).unwrap();
    assert_eq!(server.process_client_hello(&hello).unwrap(), b"from disk");
    let response = server.generate_server_response(None).unwrap();
    client.process_server_response(&response).unwrap();
    assert_eq!(
        &client.session_key().unwrap()[..],
        &server.session_key().unwrap()[..]
    );
}

#[test]
fn test_regenerate_replaces_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.key");
    let kem = OwChCca16::new();

    let (first, _) = KeyStore::generate(&kem, &path, &mut OsRng).unwrap();
    let (second, _) = KeyStore::generate(&kem, &path, &mut OsRng).unwrap();
    assert_ne!(first, second);

    let loaded = KeyStore::load_public_key(&kem, &KeyStore::public_key_path(&path)).unwrap();
    assert_eq!(loaded, second);
    assert_eq!(kem.name(), loaded.algorithm());
}
