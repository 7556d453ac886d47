use crate::error::{ChainError, Result};
use tally_types::{Address, TokenAmount};

/// 4-byte selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Payload length of an ERC-20 transfer call: selector + two 32-byte words.
const TRANSFER_CALL_LEN: usize = 4 + 32 + 32;

/// Recipient and amount extracted from an ERC-20 `transfer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub to: Address,
    pub amount: TokenAmount,
}

/// Decode the call data of an ERC-20 `transfer(address,uint256)` invocation.
///
/// The decoder is strict: the selector, the payload length, and the ABI
/// zero-padding of both words must all match exactly. Anything else is an
/// `UndecodableTransfer`, surfaced to the caller rather than skipped.
pub fn decode_transfer(data: &[u8]) -> Result<DecodedTransfer> {
    if data.len() != TRANSFER_CALL_LEN {
        return Err(ChainError::UndecodableTransfer(format!(
            "expected {} bytes of call data, got {}",
            TRANSFER_CALL_LEN,
            data.len()
        )));
    }

    if data[..4] != TRANSFER_SELECTOR {
        return Err(ChainError::UndecodableTransfer(format!(
            "unexpected selector 0x{}",
            hex::encode(&data[..4])
        )));
    }

    // First word: recipient address, left-padded with 12 zero bytes.
    let addr_word = &data[4..36];
    if addr_word[..12].iter().any(|b| *b != 0) {
        return Err(ChainError::UndecodableTransfer(
            "recipient word has non-zero padding".into(),
        ));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&addr_word[12..]);

    // Second word: uint256 amount. Anything beyond u128 is outside the
    // representable range of the settlement token.
    let amount_word = &data[36..68];
    if amount_word[..16].iter().any(|b| *b != 0) {
        return Err(ChainError::UndecodableTransfer(
            "transfer amount exceeds representable range".into(),
        ));
    }
    let mut amount_bytes = [0u8; 16];
    amount_bytes.copy_from_slice(&amount_word[16..]);
    let amount = u128::from_be_bytes(amount_bytes);

    Ok(DecodedTransfer {
        to: Address::from_bytes(addr),
        amount: TokenAmount::from_base_units(amount),
    })
}

/// Encode a transfer call. Test fixtures and the mock ledger use this to
/// build realistic call data.
pub fn encode_transfer(to: &Address, amount: TokenAmount) -> Vec<u8> {
    let mut data = Vec::with_capacity(TRANSFER_CALL_LEN);
    data.extend_from_slice(&TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to.as_bytes());
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&amount.to_base_units().to_be_bytes());
    data
}
