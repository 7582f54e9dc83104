//! End-to-end flows through the public API: store lifecycle, transaction
//! signing, delegation, and keystore import/export.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use tempfile::tempdir;
use vethor_core::signing::DelegationClient;
use vethor_core::thor::address_from_secret_key;
use vethor_core::thor::secp;
use vethor_core::thor::transaction::{Clause, Transaction, TransactionBody};
use vethor_core::utils::hexutils;
use vethor_core::wallet::Keystore;
use vethor_core::{DeviceStore, ErrorCode, Network, SigningService, WalletMode};

const MNEMONIC: &str =
    "denial kitchen pet squirrel other broom bar gas better priority spoil cross";
const PAYER_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

fn transfer_body(delegated: bool) -> TransactionBody {
    let mut body = TransactionBody {
        chain_tag: Network::Test.chain_tag(),
        block_ref: [0, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef],
        expiration: 720,
        clauses: vec![Clause {
            to: Some("0x7567d83b7b8d80addcb281a71d54fc7b3364ffed".to_string()),
            value: 1_000_000_000_000_000_000,
            data: vec![],
        }],
        gas_price_coef: 0,
        gas: 21000,
        depends_on: None,
        nonce: 0xf2ed7cd2,
        reserved: Default::default(),
    };
    if delegated {
        body.set_delegated();
    }
    body
}

/// One-shot HTTP responder standing in for a sponsor service; returns
/// the endpoint URL and a handle yielding the request it served
fn mock_sponsor(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/sign", listener.local_addr().unwrap());
    let body = body.to_string();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_http_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {} Sponsor\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        request
    });
    (url, handle)
}

fn read_http_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if request_complete(&data) {
            break;
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn request_complete(data: &[u8]) -> bool {
    let header_end = match data.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => pos,
        None => return false,
    };
    let headers = String::from_utf8_lossy(&data[..header_end]);
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    data.len() >= header_end + 4 + content_length
}

#[test]
fn full_wallet_flow_from_mnemonic_to_raw_transaction() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wallet.store");

    // Set up a store with one device
    let mut store = DeviceStore::create(&path, "correct horse").unwrap();
    let device = store.add_mnemonic_device(MNEMONIC, "Daily wallet", None).unwrap();
    let root = device.root_address.clone();

    // Sign a transfer with account 0
    let mut tx = Transaction::new(transfer_body(false));
    let mut service = SigningService::new(&mut store, WalletMode::Unlocked);
    service.sign_transaction(&mut tx, &root, 0, None).unwrap();

    // The raw form round-trips and carries a recoverable origin
    let raw = tx.encode().unwrap();
    let decoded = Transaction::decode(&raw).unwrap();
    assert!(hexutils::compare_addresses(&decoded.origin().unwrap(), &root));
    assert_eq!(decoded.id().unwrap(), tx.id().unwrap());
}

#[test]
fn reopened_store_signs_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wallet.store");

    let mut store = DeviceStore::create(&path, "pw").unwrap();
    let root = store
        .add_mnemonic_device(MNEMONIC, "Main", None)
        .unwrap()
        .root_address;

    let tx = Transaction::new(transfer_body(false));
    let hash = tx.signing_hash().unwrap();
    let first = SigningService::new(&mut store, WalletMode::Unlocked)
        .sign_hash(&root, 0, &hash, None)
        .unwrap();
    drop(store);

    let mut reopened = DeviceStore::open(&path).unwrap();
    reopened.unlock("pw").unwrap();
    let second = SigningService::new(&mut reopened, WalletMode::Unlocked)
        .sign_hash(&root, 0, &hash, None)
        .unwrap();

    assert_eq!(first, second);
    let mut signed = tx.clone();
    signed.set_signature(second);
    assert!(hexutils::compare_addresses(&signed.origin().unwrap(), &root));
}

#[test]
fn ask_to_sign_never_leaves_the_store_unlocked() {
    let dir = tempdir().unwrap();
    let mut store = DeviceStore::create(dir.path().join("s.store"), "pw").unwrap();
    let root = store
        .add_mnemonic_device(MNEMONIC, "Main", None)
        .unwrap()
        .root_address;
    store.lock();

    let hash = [0x5au8; 32];
    {
        let mut service = SigningService::new(&mut store, WalletMode::AskToSign);

        // Missing password
        let err = service.sign_hash(&root, 0, &hash, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        // Wrong password
        let err = service.sign_hash(&root, 0, &hash, Some("nope")).unwrap_err();
        assert_eq!(err.code, ErrorCode::IncorrectPassword);

        // Success
        service.sign_hash(&root, 0, &hash, Some("pw")).unwrap();

        // Unknown device after a successful unlock
        let missing = "0xd989829d88b0ed1b06edf5c50174ecfa64f14a64";
        assert!(service.sign_hash(missing, 0, &hash, Some("pw")).is_err());
    }
    assert!(!store.is_unlocked());
}

#[test]
fn delegated_transaction_with_local_gas_payer() {
    let dir = tempdir().unwrap();
    let mut store = DeviceStore::create(dir.path().join("s.store"), "pw").unwrap();
    let origin_root = store
        .add_mnemonic_device(MNEMONIC, "Main", None)
        .unwrap()
        .root_address;
    let payer_root = store
        .add_mnemonic_device(PAYER_MNEMONIC, "Fee payer", None)
        .unwrap()
        .root_address;

    let mut tx = Transaction::new(transfer_body(true));
    let mut service = SigningService::new(&mut store, WalletMode::Unlocked);
    let delegation = service
        .sign_with_local_payer(&mut tx, &origin_root, 0, &payer_root, 0, None)
        .unwrap();

    // The wire form carries both signatures and the feature bit
    let raw = tx.encode().unwrap();
    let decoded = Transaction::decode(&raw).unwrap();
    assert!(decoded.is_delegated());
    assert!(hexutils::compare_addresses(&decoded.origin().unwrap(), &origin_root));
    assert!(hexutils::compare_addresses(&decoded.gas_payer().unwrap(), &payer_root));
    assert!(hexutils::compare_addresses(&delegation.gas_payer, &payer_root));

    // The gas payer signature matches what a sponsor would have produced
    let expected_hash = decoded.delegated_signing_hash(&decoded.origin().unwrap()).unwrap();
    let payer_sig = hexutils::decode(&delegation.signature).unwrap();
    let recovered = secp::recover_address(&expected_hash, &payer_sig).unwrap();
    assert!(hexutils::compare_addresses(&recovered, &payer_root));
}

#[test]
fn sponsor_signature_recovers_gas_payer() {
    let dir = tempdir().unwrap();
    let mut store = DeviceStore::create(dir.path().join("s.store"), "pw").unwrap();
    let root = store
        .add_mnemonic_device(MNEMONIC, "Main", None)
        .unwrap()
        .root_address;

    let mut tx = Transaction::new(transfer_body(true));

    // The sponsor answers with a real signature over the delegated hash
    let payer_key = secp256k1::SecretKey::from_slice(&[0x22u8; 32]).unwrap();
    let payer_hash = tx.delegated_signing_hash(&root).unwrap();
    let payer_sig = secp::sign_hash(&payer_hash, &payer_key).unwrap();
    let reply = format!(
        r#"{{"signature":"{}"}}"#,
        hexutils::encode_prefixed(&payer_sig)
    );
    let (url, server) = mock_sponsor(200, &reply);

    let sponsor = DelegationClient::new(&url).unwrap();
    let delegation = SigningService::new(&mut store, WalletMode::Unlocked)
        .sign_with_sponsor(&mut tx, &root, 0, &sponsor, None)
        .unwrap();
    let request = server.join().unwrap();

    let payer = address_from_secret_key(&payer_key);
    assert!(hexutils::compare_addresses(&delegation.gas_payer, &payer));
    assert!(hexutils::compare_addresses(&tx.gas_payer().unwrap(), &payer));
    assert!(hexutils::compare_addresses(&tx.origin().unwrap(), &root));

    // The POST body carried the lowercased origin and the unsigned raw form
    assert!(request.contains(&root.to_lowercase()));
    assert!(request.contains(&hexutils::encode_prefixed(&tx.encode_unsigned().unwrap())));
}

#[test]
fn sponsor_rejection_with_multibyte_body_is_an_error() {
    let body = "€".repeat(100);
    let (url, server) = mock_sponsor(500, &body);

    let tx = Transaction::new(transfer_body(true));
    let err = DelegationClient::new(&url)
        .unwrap()
        .request_signature(&tx, "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed")
        .unwrap_err();
    server.join().unwrap();

    assert_eq!(err.code, ErrorCode::DelegationFailed);
    assert!(err.details.unwrap().contains('€'));
}

#[test]
fn malformed_sponsor_replies_fail_cleanly() {
    let tx = Transaction::new(transfer_body(true));
    let origin = "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed";

    for reply in [
        r#"{}"#,
        r#"{"error":"origin not sponsored"}"#,
        r#"{"signature":"0xdead"}"#,
        "not json at all",
    ] {
        let (url, server) = mock_sponsor(200, reply);
        let err = DelegationClient::new(&url)
            .unwrap()
            .request_signature(&tx, origin)
            .unwrap_err();
        server.join().unwrap();
        assert_eq!(err.code, ErrorCode::DelegationFailed, "reply: {}", reply);
    }
}

#[test]
fn store_invariants_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wallet.store");

    let store = DeviceStore::create(&path, "pw").unwrap();
    let first = store.add_mnemonic_device(MNEMONIC, "One", None).unwrap();
    let second = store
        .add_mnemonic_device(PAYER_MNEMONIC, "Two", None)
        .unwrap();
    store.add_account(&second.root_address, 1, "Side", None).unwrap();
    drop(store);

    let mut store = DeviceStore::open(&path).unwrap();
    store.unlock("pw").unwrap();

    // Duplicate detection still applies after reopen
    let err = store.add_mnemonic_device(MNEMONIC, "Clone", None).unwrap_err();
    assert_eq!(err.message, "wallet_already_exists");

    // Cascade: removing device two drops both of its accounts
    store.remove_device(&second.root_address).unwrap();
    assert!(store.accounts_for_device(&second.root_address).unwrap().is_empty());
    assert_eq!(store.devices().unwrap().len(), 1);

    // Last device stays protected
    let err = store.remove_device(&first.root_address).unwrap_err();
    assert_eq!(err.message, "cannot_remove_last_device");
}

#[test]
fn keystore_import_signs_like_the_original_key() {
    let secret = secp256k1::SecretKey::from_slice(
        &hex::decode("7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a").unwrap(),
    )
    .unwrap();

    let keystore = Keystore::encrypt(&secret, "import me").unwrap();
    let json = serde_json::to_string(&keystore).unwrap();

    let parsed = Keystore::parse(&json).unwrap();
    let imported = parsed.decrypt_to_secret("import me").unwrap();
    assert_eq!(imported, secret);

    // The imported key drives a private key device end to end
    let dir = tempdir().unwrap();
    let mut store = DeviceStore::create(dir.path().join("s.store"), "pw").unwrap();
    let device = store
        .add_private_key_device(&hex::encode(imported.secret_bytes()), "Imported")
        .unwrap();

    let mut tx = Transaction::new(transfer_body(false));
    SigningService::new(&mut store, WalletMode::Unlocked)
        .sign_transaction(&mut tx, &device.root_address, 0, None)
        .unwrap();
    assert!(hexutils::compare_addresses(
        &tx.origin().unwrap(),
        &device.root_address
    ));
}
