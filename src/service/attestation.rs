use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{self, time::MissedTickBehavior},
    Orbit, Rocket,
};

use crate::collaborators::{AttestationLedger, Collaborators};
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    common::vote::{Vote, VoteSummary},
    store::{Stores, VoteStore},
};

/// Most votes attested in one backfill sweep.
const BACKFILL_BATCH: i64 = 100;

/// Records votes in the attestation ledger.
pub struct Attestor<'a> {
    votes: &'a dyn VoteStore,
    ledger: &'a dyn AttestationLedger,
}

impl<'a> Attestor<'a> {
    pub fn new(votes: &'a dyn VoteStore, ledger: &'a dyn AttestationLedger) -> Self {
        Self { votes, ledger }
    }

    /// Attest a stored vote and attach the ledger reference to it.
    pub async fn attest(&self, vote: &mut Vote) -> Result<()> {
        let reference = self.ledger.record(&VoteSummary::from(&*vote)).await?;
        self.votes.attach_attestation(vote.id, &reference).await?;
        vote.attestation = Some(reference);
        Ok(())
    }

    /// Attest up to one batch of votes the ledger missed when they were cast.
    ///
    /// Stops at the first failure, since the ledger is probably still down.
    /// Returns how many votes were attested.
    pub async fn backfill(&self) -> Result<usize> {
        let pending = self.votes.unattested(BACKFILL_BATCH).await?;
        let mut attested = 0;
        for mut vote in pending {
            self.attest(&mut vote).await?;
            attested += 1;
        }
        Ok(attested)
    }
}

/// A fairing that, once the server is up, periodically attests votes the
/// ledger failed to record at cast time.
/// This fairing depends on the config, stores and collaborators being in
/// managed state, and so must be attached after the fairings responsible.
pub struct AttestationBackfillFairing;

#[rocket::async_trait]
impl Fairing for AttestationBackfillFairing {
    fn info(&self) -> Info {
        Info {
            name: "Attestation Backfill",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(config), Some(stores), Some(collaborators)) = (
            rocket.state::<Config>(),
            rocket.state::<Stores>(),
            rocket.state::<Collaborators>(),
        ) else {
            error!("Managed state was not available, attestation backfill is disabled");
            return;
        };
        let period = match config.attestation_retry_interval().to_std() {
            Ok(period) if !period.is_zero() => period,
            _ => {
                error!("Invalid `attestation_retry_interval`, attestation backfill is disabled");
                return;
            }
        };
        let stores = stores.clone();
        let collaborators = collaborators.clone();

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let attestor =
                    Attestor::new(stores.votes.as_ref(), collaborators.ledger.as_ref());
                match attestor.backfill().await {
                    Ok(0) => debug!("Attestation backfill had nothing to do"),
                    Ok(n) => info!("Attestation backfill attested {n} votes"),
                    Err(e) => warn!(
                        "Attestation backfill failed, retrying in {} seconds: {e}",
                        period.as_secs()
                    ),
                }
            }
        });
        info!("Attestation backfill scheduled");
    }
}
