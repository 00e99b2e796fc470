//! Contract deployment helpers
use std::{fs, path::Path};

use alloy::{
    contract::RawCallBuilder,
    hex,
    primitives::{Address, Bytes},
    providers::Provider,
};
use anyhow::Context;

type ContractResult<T> = Result<T, alloy::contract::Error>;

/// Deploy a contract (with logging)
pub async fn deploy<P: Provider>(name: &str, tx: RawCallBuilder<P>) -> ContractResult<Address> {
    tracing::info!("deploying {name}");
    let pending_tx = tx.send().await?;
    let tx_hash = *pending_tx.tx_hash();
    tracing::info!(%tx_hash, "waiting for tx to be mined");

    let receipt = pending_tx.get_receipt().await?;
    tracing::info!(%receipt.gas_used, %tx_hash, "tx mined");
    let addr = receipt
        .contract_address
        .ok_or(alloy::contract::Error::ContractNotDeployed)?;

    tracing::info!("deployed {name} at {addr:#x}");
    Ok(addr)
}

/// Deploy compiled creation bytecode as-is, without constructor arguments.
pub async fn deploy_bytecode<P: Provider>(
    name: &str,
    provider: P,
    bytecode: Bytes,
) -> ContractResult<Address> {
    deploy(name, RawCallBuilder::new_raw_deploy(provider, bytecode)).await
}

/// Read hex encoded bytecode as emitted by `solc --bin`; a `0x` prefix is optional.
pub fn read_bytecode(path: impl AsRef<Path>) -> anyhow::Result<Bytes> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading bytecode from {}", path.display()))?;
    let code = hex::decode(text.trim())
        .with_context(|| format!("{} is not hex encoded", path.display()))?;
    anyhow::ensure!(!code.is_empty(), "{} holds no bytecode", path.display());
    Ok(code.into())
}

pub fn write_address(path: impl AsRef<Path>, address: Address) -> anyhow::Result<()> {
    let path = path.as_ref();
    fs::write(path, address.to_checksum(None))
        .with_context(|| format!("writing contract address to {}", path.display()))
}

pub fn read_address(path: impl AsRef<Path>) -> anyhow::Result<Address> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading contract address from {}", path.display()))?;
    text.trim()
        .parse()
        .with_context(|| format!("{} does not hold an address", path.display()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use alloy::{primitives::bytes, providers::ProviderBuilder};
    use rand::prelude::*;

    use super::*;

    // creation code copying a 10 byte runtime that returns 42
    const CREATION_CODE: &str = "600a600c600039600a6000f3602a60805260206080f3";

    fn scratch_file(name: &str) -> PathBuf {
        let suffix = rand::rng().random::<u64>();
        std::env::temp_dir().join(format!("ev-charging-{suffix:x}-{name}"))
    }

    #[test]
    fn bytecode_with_and_without_prefix() {
        let path = scratch_file("Contract.bin");
        fs::write(&path, format!("{CREATION_CODE}\n")).unwrap();
        let plain = read_bytecode(&path).unwrap();

        fs::write(&path, format!("0x{CREATION_CODE}")).unwrap();
        let prefixed = read_bytecode(&path).unwrap();

        assert_eq!(plain, prefixed);
        assert_eq!(plain.len(), 22);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn empty_or_garbage_bytecode_fails() {
        let path = scratch_file("Broken.bin");
        fs::write(&path, "").unwrap();
        assert!(read_bytecode(&path).is_err());
        fs::write(&path, "not hex").unwrap();
        assert!(read_bytecode(&path).is_err());
        fs::remove_file(path).unwrap();

        assert!(read_bytecode(scratch_file("Missing.bin")).is_err());
    }

    #[test]
    fn address_file_roundtrip() {
        let path = scratch_file("Contract.address");
        let address = Address::repeat_byte(0xab);
        write_address(&path, address).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), address.to_checksum(None));
        assert_eq!(read_address(&path).unwrap(), address);
        fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    #[ignore = "spawns a local anvil node"]
    async fn test_deploy_bytecode() {
        let provider = ProviderBuilder::new().connect_anvil_with_wallet();
        let code = hex::decode(CREATION_CODE).unwrap();
        let addr = deploy_bytecode("Answer", &provider, code.into()).await.unwrap();
        assert_eq!(provider.get_code_at(addr).await.unwrap(), bytes!("602a60805260206080f3"));
    }
}
