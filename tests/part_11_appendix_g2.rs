//! Replays the terminal side of ICAO Doc 9303 Part 11 Appendix G.2 (DH, Generic Mapping,
//! 1024-bit MODP group with 160-bit prime order subgroup, AES-128).


use hex_literal::hex;
use icao_pace::pace::{HandshakeState, PaceConfig, PaceContext, PaceSecret, Role};
use icao_pace::pace::oids::PACE_DH_GM_AES_CBC_CMAC_128;


const MRZ_KEY: [u8; 24] = *b"T22000129364081251010318";
const ENCRYPTED_NONCE: [u8; 16] = hex!("854D8DF5 827FA685 2D1A4FA7 01CDDDCA");

const TERMINAL_MAPPING_PRIVATE_KEY: [u8; 20] = hex!("5265030F 751F4AD1 8B08AC56 5FC7AC95 2E41618D");
const TERMINAL_MAPPING_PUBLIC_KEY: [u8; 128] = hex!("
    23FB3749 EA030D2A 25B278D2 A562047A DE3F01B7 4F17A154 02CB7352 CA7D2B3E
    B71C343D B13D1DEB CE9A3666 DBCFC920 B49174A6 02CB4796 5CAA73DC 702489A4
    4D41DB91 4DE9613D C5E98C94 160551C0 DF86274B 9359BC04 90D01B03 AD54022D
    CB4F57FA D6322497 D7A1E28D 46710F46 1AFE710F BBBC5F8B A166F431 1975EC6C
");
const CHIP_MAPPING_PUBLIC_KEY: [u8; 128] = hex!("
    78879F57 225AA808 0D52ED0F C890A4B2 5336F699 AA89A2D3 A189654A F70729E6
    23EA5738 B26381E4 DA19E004 706FACE7 B235C2DB F2F38748 312F3C98 C2DD4882
    A41947B3 24AA1259 AC22579D B93F7085 655AF308 89DBB845 D9E6783F E42C9F24
    49400306 254C8AE8 EE9DD812 A804C0B6 6E8CAFC1 4F84D825 8950A91B 44126EE6
");

const TERMINAL_EPHEMERAL_PRIVATE_KEY: [u8; 20] = hex!("89CCD99B 0E8D3B1F 11E1296D CA68EC53 411CF2CA");
const TERMINAL_EPHEMERAL_PUBLIC_KEY: [u8; 128] = hex!("
    907D89E2 D425A178 AA81AF4A 7774EC8E 388C115C AE67031E 85EECE52 0BD91155
    1B9AE4D0 4369F29A 02626C86 FBC6747C C7BC3526 45B6161A 2A42D44E DA80A08F
    A8D61B76 D3A154AD 8A5A5178 6B0BC071 47057871 A922212C 5F67F431 73172236
    B7747D16 71E6D692 A3C7D40A 0C3C5CE3 97545D01 5C175EB5 130551ED BC2EE5D4
");
const CHIP_EPHEMERAL_PUBLIC_KEY: [u8; 128] = hex!("
    075693D9 AE941877 573E634B 6E644F8E 60AF17A0 076B8B12 3D920107 4D36152B
    D8B3A213 F53820C4 2ADC79AB 5D0AEEC3 AEFB9139 4DA476BD 97B9B14D 0A65C1FC
    71A0E019 CB08AF55 E1F72900 5FBA7E3F A5DC4189 9238A250 767A6D46 DB974064
    386CD456 743585F8 E5D90CC8 B4004B1F 6D866C79 CE0584E4 9687FF61 BC29AEA1
");

const TERMINAL_TOKEN: [u8; 8] = hex!("B46DD9BD 4D98381F");
const CHIP_TOKEN: [u8; 8] = hex!("917F37B5 C0E6D8D1");


#[test]
fn test_pace_terminal_appg2() {
    let config = PaceConfig::new(PACE_DH_GM_AES_CBC_CMAC_128, 0, Role::Terminal)
        .expect("failed to configure PACE");
    let secret = PaceSecret::from_mrz_fields("T22000129", "640812", "101031")
        .expect("failed to encode MRZ secret");
    let secret_from_key = PaceSecret::from_mrz_key(&MRZ_KEY)
        .expect("failed to encode MRZ key");
    assert_eq!(secret.encoded(), secret_from_key.encoded());
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
    assert!(terminal.verify_authentication_token(&CHIP_TOKEN).expect("malformed chip token"));
    assert_eq!(terminal.state(), HandshakeState::TokenExchanged);

    let session_keys = terminal.session_keys().expect("session keys unavailable");
    assert_eq!(session_keys.encryption_key().len(), 16);
    assert_eq!(session_keys.mac_key().len(), 16);
}
