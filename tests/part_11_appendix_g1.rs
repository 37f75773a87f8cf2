//! Replays the terminal side of ICAO Doc 9303 Part 11 Appendix G.1 (ECDH, Generic Mapping,
//! brainpoolP256r1, AES-128).


use hex_literal::hex;
use icao_pace::pace::{HandshakeState, PaceConfig, PaceContext, PaceSecret, Role};
use icao_pace::pace::oids::PACE_ECDH_GM_AES_CBC_CMAC_128;


const CARD_ACCESS: [u8; 22] = hex!("31 14 30 12 06 0A 04 00 7F 00 07 02 02 04 02 02 02 01 02 02 01 0D");
const MRZ_KEY: [u8; 24] = *b"T22000129364081251010318";
const ENCRYPTED_NONCE: [u8; 16] = hex!("95A3A016 522EE98D 01E76CB6 B98B42C3");

const TERMINAL_MAPPING_PRIVATE_KEY: [u8; 32] = hex!("
    7F4EF07B 9EA82FD7 8AD689B3 8D0BC78C F21F249D 953BC46F 4C6E1925 9C010F99
");
const TERMINAL_MAPPING_PUBLIC_KEY: [u8; 65] = hex!("
    04
    7ACF3EFC 982EC455 65A4B155 129EFBC7 4650DCBF A6362D89 6FC70262 E0C2CC5E
    544552DC B6725218 799115B5 5C9BAA6D 9F6BC3A9 618E70C2 5AF71777 A9C4922D
");
const CHIP_MAPPING_PUBLIC_KEY: [u8; 65] = hex!("
    04
    824FBA91 C9CBE26B EF53A0EB E7342A3B F178CEA9 F45DE0B7 0AA60165 1FBA3F57
    30D8C879 AAA9C9F7 3991E61B 58F4D52E B87A0A0C 709A49DC 63719363 CCD13C54
");

const TERMINAL_EPHEMERAL_PRIVATE_KEY: [u8; 32] = hex!("
    A73FB703 AC1436A1 8E0CFA5A BB3F7BEC 7A070E7A 6788486B EE230C4A 22762595
");
const TERMINAL_EPHEMERAL_PUBLIC_KEY: [u8; 65] = hex!("
    04
    2DB7A64C 0355044E C9DF1905 14C625CB A2CEA487 54887122 F3A5EF0D 5EDD301C
    3556F3B3 B186DF10 B857B58F 6A7EB80F 20BA5DC7 BE1D43D9 BF850149 FBB36462
");
const CHIP_EPHEMERAL_PUBLIC_KEY: [u8; 65] = hex!("
    04
    9E880F84 2905B8B3 181F7AF7 CAA9F0EF B743847F 44A306D2 D28C1D9E C65DF6DB
    7764B222 77A2EDDC 3C265A9F 018F9CB8 52E111B7 68B32690 4B59A019 3776F094
");

const TERMINAL_TOKEN: [u8; 8] = hex!("C2B0BD78 D94BA866");
const CHIP_TOKEN: [u8; 8] = hex!("3ABB9674 BCE93C08");


fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}


#[test]
fn test_pace_terminal_appg1() {
    init_logging();

    let config = PaceConfig::from_card_access(&CARD_ACCESS, Role::Terminal)
        .expect("failed to evaluate EF.CardAccess");
    assert_eq!(config.protocol().oid(), PACE_ECDH_GM_AES_CBC_CMAC_128);
    let secret = PaceSecret::from_mrz_key(&MRZ_KEY)
        .expect("failed to encode MRZ secret");
    let mut terminal = PaceContext::new(config);

    terminal.decrypt_nonce(&secret, &ENCRYPTED_NONCE)
        .expect("failed to decrypt nonce");

    let mapping_public_key = terminal.generate_mapping_data_with_private_key(&TERMINAL_MAPPING_PRIVATE_KEY)
        .expect("failed to generate mapping data");
    assert_eq!(mapping_public_key, TERMINAL_MAPPING_PUBLIC_KEY);
    terminal.map_generator(&CHIP_MAPPING_PUBLIC_KEY)
        .expect("failed to map generator");

    let ephemeral_public_key = terminal.generate_ephemeral_key_with_private_key(&TERMINAL_EPHEMERAL_PRIVATE_KEY)
        .expect("failed to generate ephemeral key");
    assert_eq!(ephemeral_public_key, TERMINAL_EPHEMERAL_PUBLIC_KEY);
    terminal.compute_shared_secret(&CHIP_EPHEMERAL_PUBLIC_KEY)
        .expect("failed to compute shared secret");
    terminal.derive_keys()
        .expect("failed to derive keys");

    let token = terminal.compute_authentication_token(&CHIP_EPHEMERAL_PUBLIC_KEY)
        .expect("failed to compute authentication token");
    assert_eq!(token, TERMINAL_TOKEN);
    terminal.finish(&CHIP_TOKEN)
        .expect("chip token rejected");
    assert_eq!(terminal.state(), HandshakeState::TokenExchanged);

    let session_keys = terminal.into_session_keys()
        .expect("session keys unavailable");
    assert_eq!(session_keys.encryption_key(), &hex!("F5F0E35C 0D7161EE 6724EE51 3A0D9A7F"));
    assert_eq!(session_keys.mac_key(), &hex!("FE251C78 58B356B2 4514B3BD 5F4297D1"));
}


#[test]
fn test_pace_terminal_appg1_wrong_chip_token() {
    let config = PaceConfig::from_card_access(&CARD_ACCESS, Role::Terminal).unwrap();
    let secret = PaceSecret::from_mrz_key(&MRZ_KEY).unwrap();
    let mut terminal = PaceContext::new(config);
    terminal.decrypt_nonce(&secret, &ENCRYPTED_NONCE).unwrap();
    terminal.generate_mapping_data_with_private_key(&TERMINAL_MAPPING_PRIVATE_KEY).unwrap();
    terminal.map_generator(&CHIP_MAPPING_PUBLIC_KEY).unwrap();
    terminal.generate_ephemeral_key_with_private_key(&TERMINAL_EPHEMERAL_PRIVATE_KEY).unwrap();
    terminal.compute_shared_secret(&CHIP_EPHEMERAL_PUBLIC_KEY).unwrap();
    terminal.derive_keys().unwrap();

    // the terminal's own token must not be accepted as the chip's
    assert!(!terminal.verify_authentication_token(&TERMINAL_TOKEN).unwrap());
    assert!(matches!(terminal.finish(&TERMINAL_TOKEN), Err(icao_pace::pace::Error::TokenMismatch)));
    assert_eq!(terminal.state(), HandshakeState::SessionKeysDerived);
    assert!(terminal.session_keys().is_err());
}
