use std::path::PathBuf;

use alloy::{
    primitives::{Address, U256},
    transports::http::reqwest::Url,
};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ev_charging_contract::{
    deployer::read_address,
    pricing::{PolicyKind, QuadraticCurve},
    provider::{ClientConfig, build_signer},
    rates::{RegionTag, RegistryVersion},
    role::{Role, generate_nonce},
    tariff::{
        DEFAULT_PRECISION, DEFAULT_SLOT_COUNT, RoamingConfig, Tariff, TariffConfig,
        UnitConversion,
    },
};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the priced schedule as JSON without touching the chain.
    Rates(TariffArgs),

    /// Deploy the charging contract from its compiled bytecode.
    Deploy(DeployArgs),

    /// Publish a priced schedule as a charge point operator.
    SubmitRates(Box<SubmitRatesArgs>),

    /// Answer on-chain rate requests with fresh schedules for every region.
    Oracle(Box<OracleArgs>),

    /// Register the signing account as an EV or a CPO.
    Register(RegisterArgs),

    /// Register a charging station under the signing operator.
    RegisterStation(RegisterStationArgs),

    /// Ask the contract to refresh automatic rates, which wakes the oracle.
    RequestRates(ContractArgs),

    /// Announce the roaming surcharge for the next rate period.
    NextRoaming(NextRoamingArgs),

    /// Send one side of the EV / station connection handshake.
    Connect(ConnectArgs),

    /// Print the registration flags of an account.
    Status(StatusArgs),
}

#[derive(Parser)]
pub struct NodeArgs {
    /// Websocket endpoint of the node.
    #[clap(long = "node-url", env = "NODE_URL", default_value = "ws://127.0.0.1:8546")]
    pub url: Url,

    /// Hex encoded private key of the signing account.
    #[clap(long = "private-key", env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
}

impl NodeArgs {
    pub fn client_config(&self, contract: Address) -> anyhow::Result<ClientConfig> {
        let signer = build_signer(&self.private_key).context("invalid private key")?;
        Ok(ClientConfig::new(self.url.clone(), signer, contract))
    }
}

#[derive(Parser)]
pub struct ContractArgs {
    #[clap(flatten)]
    pub node: NodeArgs,

    /// Deployed contract address; takes precedence over `--address-file`.
    #[clap(long = "contract-address", env = "CONTRACT_ADDRESS")]
    pub address: Option<Address>,

    #[clap(
        long = "address-file",
        env = "CONTRACT_ADDRESS_FILE",
        default_value = "contracts/Contract.address"
    )]
    pub address_file: PathBuf,
}

impl ContractArgs {
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let contract = match self.address {
            Some(address) => address,
            None => read_address(&self.address_file)?,
        };
        self.node.client_config(contract)
    }
}

#[derive(Parser)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub node: NodeArgs,

    #[clap(long, env = "CONTRACT_BYTECODE", default_value = "contracts/Contract.bin")]
    pub bytecode: PathBuf,

    /// Where to write the deployed address.
    #[clap(
        long = "address-file",
        env = "CONTRACT_ADDRESS_FILE",
        default_value = "contracts/Contract.address"
    )]
    pub address_file: PathBuf,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum PriceUnit {
    /// Prices per energy-hour, published per energy-second.
    PerHour,
    /// Prices per kilowatt-hour, published per watt-second.
    PerKilowattHour,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum PolicyArg {
    Alternating,
    Uniform,
    Quadratic,
}

#[derive(Parser)]
pub struct TariffArgs {
    #[clap(long = "slot-count", env = "SLOT_COUNT", default_value_t = DEFAULT_SLOT_COUNT)]
    pub slot_count: usize,

    /// Fixed-point scaling factor, published alongside the schedule.
    #[clap(long, env = "PRECISION", default_value_t = DEFAULT_PRECISION)]
    pub precision: u64,

    #[clap(long, value_enum, env = "PRICE_UNIT", default_value = "per-hour")]
    pub unit: PriceUnit,

    /// Explicit unit divisor, overrides `--unit`.
    #[clap(long = "unit-divisor", env = "UNIT_DIVISOR")]
    pub unit_divisor: Option<Decimal>,

    #[clap(long, value_enum, env = "PRICING_POLICY", default_value = "alternating")]
    pub policy: PolicyArg,

    #[clap(long = "even-price", env = "EVEN_PRICE", default_value = "0.001")]
    pub even_price: Decimal,

    #[clap(long = "odd-price", env = "ODD_PRICE", default_value = "0.002")]
    pub odd_price: Decimal,

    /// Price of every slot for the uniform policy.
    #[clap(long, env = "PRICE")]
    pub price: Option<Decimal>,

    /// `a,b,c` of `a * i^2 + b * i + c` for the quadratic policy.
    #[clap(long = "curve", value_delimiter = ',', allow_hyphen_values = true)]
    pub curve: Option<Vec<Decimal>>,

    #[clap(long = "roaming-price", env = "ROAMING_PRICE", default_value = "0.0001")]
    pub roaming_price: Decimal,
}

fn unit_conversion(unit: PriceUnit, divisor: Option<Decimal>) -> UnitConversion {
    match (divisor, unit) {
        (Some(divisor), _) => UnitConversion::Custom(divisor),
        (None, PriceUnit::PerHour) => UnitConversion::PerHourToPerSecond,
        (None, PriceUnit::PerKilowattHour) => UnitConversion::PerKilowattHourToPerWattSecond,
    }
}

impl TariffArgs {
    pub fn tariff(&self) -> anyhow::Result<Tariff<PolicyKind>> {
        let unit = unit_conversion(self.unit, self.unit_divisor);
        let policy = match self.policy {
            PolicyArg::Alternating => {
                PolicyKind::Alternating { even: self.even_price, odd: self.odd_price }
            }
            PolicyArg::Uniform => {
                let Some(price) = self.price else {
                    bail!("the uniform policy needs `--price`");
                };
                PolicyKind::Uniform { price }
            }
            PolicyArg::Quadratic => {
                let QuadraticCurve { a, b, c } = match self.curve.as_deref() {
                    Some(&[a, b, c]) => QuadraticCurve::new(a, b, c),
                    Some(_) => bail!("`--curve` takes exactly three coefficients"),
                    None => QuadraticCurve::default(),
                };
                PolicyKind::Quadratic { a, b, c }
            }
        };
        let config = TariffConfig { slot_count: self.slot_count, precision: self.precision, unit };
        Ok(Tariff::new(config, policy, self.roaming_price))
    }
}

#[derive(Parser)]
pub struct SubmitRatesArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(long, value_enum, env = "RATE_REGISTRY", default_value = "v2")]
    pub registry: RegistryVersion,

    /// Price region, required by the v2 registry.
    #[clap(long, env = "REGION")]
    pub region: Option<RegionTag>,

    /// Operator owning the schedule, defaults to the signing account.
    #[clap(long)]
    pub owner: Option<Address>,
}

#[derive(Parser)]
pub struct OracleArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    #[clap(flatten)]
    pub tariff: TariffArgs,

    #[clap(long, value_enum, env = "RATE_REGISTRY", default_value = "v2")]
    pub registry: RegistryVersion,

    #[clap(
        long,
        env = "REGIONS",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "SE1,SE2,SE3,SE4",
    )]
    pub regions: Vec<RegionTag>,

    /// Operator owning the published schedules, defaults to the signing account.
    #[clap(long)]
    pub owner: Option<Address>,
}

#[derive(Parser)]
pub struct RegisterArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    #[clap(long, value_enum)]
    pub role: Role,

    /// Let the oracle publish rates for this operator.
    #[clap(long)]
    pub automatic_rates: bool,
}

#[derive(Parser)]
pub struct RegisterStationArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    #[clap(long)]
    pub station: Address,

    #[clap(long = "power-discharge")]
    pub power_discharge: U256,
}

#[derive(Parser)]
pub struct NextRoamingArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    #[clap(long = "roaming-price", env = "ROAMING_PRICE", default_value = "0.0001")]
    pub roaming_price: Decimal,

    #[clap(long, env = "PRECISION", default_value_t = DEFAULT_PRECISION)]
    pub precision: u64,

    #[clap(long, value_enum, env = "PRICE_UNIT", default_value = "per-hour")]
    pub unit: PriceUnit,

    #[clap(long = "unit-divisor", env = "UNIT_DIVISOR")]
    pub unit_divisor: Option<Decimal>,
}

impl NextRoamingArgs {
    pub fn roaming(&self) -> RoamingConfig {
        RoamingConfig {
            precision: self.precision,
            roaming_price: self.roaming_price,
            unit: unit_conversion(self.unit, self.unit_divisor),
        }
    }
}

#[derive(Parser)]
pub struct ConnectArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    /// `ev` or `cs`; both ends of the handshake send the same call.
    #[clap(long, value_enum)]
    pub role: Role,

    /// The other end of the connection.
    #[clap(long)]
    pub peer: Address,

    /// Handshake nonce; a station draws a fresh one when omitted.
    #[clap(long)]
    pub nonce: Option<U256>,
}

impl ConnectArgs {
    pub fn nonce(&self) -> anyhow::Result<U256> {
        match (self.nonce, self.role) {
            (Some(nonce), _) => Ok(nonce),
            (None, Role::Cs) => Ok(generate_nonce()),
            (None, Role::Ev) => bail!("a vehicle must echo the station's `--nonce`"),
            (None, role) => bail!("role `{role}` does not take part in the handshake"),
        }
    }
}

#[derive(Parser)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub contract: ContractArgs,

    /// Account to inspect, defaults to the signing account.
    #[clap(long)]
    pub account: Option<Address>,
}
