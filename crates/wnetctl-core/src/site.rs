// ── Site orchestrator ──
//
// Every mutation follows the same shape: validate against a snapshot,
// apply remote steps device by device in name order, compensate the
// completed prefix if a later device fails, and only then commit the new
// model and persist it. One mutation runs at a time; readers get
// `Arc<SiteModel>` snapshots that are never half-applied.

use std::fmt;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wnetctl_ssh::Connector;

use crate::agent::AccessPointAgent;
use crate::command::{AddAccessPointRequest, Command, CommandResult, TuneRadioRequest};
use crate::error::{CompensationWarning, CoreError};
use crate::model::{AccessPoint, DeviceType, MacAddress, SiteModel, Ssid, Station};
use crate::store::PersistentStore;

/// One remote edit applied to a single access point.
#[derive(Debug, Clone, Copy)]
enum RemoteStep<'a> {
    PushSsid(&'a Ssid),
    RemoveSsid(&'a Ssid),
    /// List this peer as a roaming neighbour.
    AddNeighbour(&'a AccessPoint),
    RemoveNeighbour(&'a AccessPoint),
}

// ── SiteHandle ───────────────────────────────────────────────────────

/// Entry point for reading and mutating one site.
///
/// Cheaply cloneable via `Arc<SiteInner>`. Built once per invocation and
/// passed explicitly to whatever needs it.
pub struct SiteHandle<C> {
    inner: Arc<SiteInner<C>>,
}

impl<C> Clone for SiteHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SiteInner<C> {
    model: ArcSwap<SiteModel>,
    /// Held from validation through persistence of each mutation.
    mutation: tokio::sync::Mutex<()>,
    store: Box<dyn PersistentStore>,
    agent: AccessPointAgent<C>,
    /// Compensation failures not yet drained by the caller.
    warnings: Mutex<Vec<CompensationWarning>>,
}

impl<C: Connector> SiteHandle<C> {
    /// Wrap an in-memory model. Nothing is written until the first commit.
    pub fn new(model: SiteModel, store: impl PersistentStore + 'static, agent: AccessPointAgent<C>) -> Self {
        Self {
            inner: Arc::new(SiteInner {
                model: ArcSwap::from_pointee(model),
                mutation: tokio::sync::Mutex::new(()),
                store: Box::new(store),
                agent,
                warnings: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Load the model from `store`.
    pub fn open(store: impl PersistentStore + 'static, agent: AccessPointAgent<C>) -> Result<Self, CoreError> {
        let model = store.load()?;
        Ok(Self::new(model, store, agent))
    }

    /// Current committed model.
    pub fn snapshot(&self) -> Arc<SiteModel> {
        self.inner.model.load_full()
    }

    pub fn agent(&self) -> &AccessPointAgent<C> {
        &self.inner.agent
    }

    /// Write the current model as is.
    pub fn save(&self) -> Result<(), CoreError> {
        let model = self.snapshot();
        self.inner.store.save(&model).map_err(CoreError::Persistence)
    }

    /// Drain warnings accumulated by compensation.
    pub fn take_warnings(&self) -> Vec<CompensationWarning> {
        std::mem::take(&mut *self.lock_warnings())
    }

    fn lock_warnings(&self) -> std::sync::MutexGuard<'_, Vec<CompensationWarning>> {
        self.inner
            .warnings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record_warning(&self, operation: &'static str, ap: &str, reason: impl fmt::Display) {
        let reason = reason.to_string();
        warn!(operation, ap, %reason, "compensation incomplete");
        self.lock_warnings().push(CompensationWarning {
            operation,
            ap: ap.to_owned(),
            reason,
        });
    }

    /// Swap in `model`, then persist it. The swap stands even if the
    /// write fails.
    fn commit(&self, model: SiteModel) -> Result<Arc<SiteModel>, CoreError> {
        let model = Arc::new(model);
        self.inner.model.store(Arc::clone(&model));
        self.inner
            .store
            .save(&model)
            .map_err(CoreError::Persistence)?;
        Ok(model)
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command against the site.
    pub async fn execute(&self, cmd: Command, cancel: &CancellationToken) -> Result<CommandResult, CoreError> {
        debug!(operation = cmd.operation(), "executing");
        match cmd {
            Command::AddAccessPoint(req) => {
                let ap = self.add_access_point(req, cancel).await?;
                Ok(CommandResult::AccessPoint(Box::new(ap)))
            }
            Command::RemoveAccessPoint { name } => {
                self.remove_access_point(&name, cancel).await?;
                Ok(CommandResult::Ok)
            }
            Command::TuneAccessPoint(req) => {
                let ap = self.tune_access_point(req, cancel).await?;
                Ok(CommandResult::AccessPoint(Box::new(ap)))
            }
            Command::AddSsid(ssid) => {
                self.add_ssid(ssid, cancel).await?;
                Ok(CommandResult::Ok)
            }
            Command::UpdateSsid(ssid) => {
                self.update_ssid(ssid, cancel).await?;
                Ok(CommandResult::Ok)
            }
            Command::RemoveSsid { name } => {
                self.remove_ssid(&name, cancel).await?;
                Ok(CommandResult::Ok)
            }
            Command::AddStation { ssid, station } => {
                self.add_station(&ssid, station).await?;
                Ok(CommandResult::Ok)
            }
            Command::RemoveStation { ssid, mac } => {
                self.remove_station(&ssid, &mac).await?;
                Ok(CommandResult::Ok)
            }
            Command::AddDeviceType(device) => {
                self.add_device_type(device).await?;
                Ok(CommandResult::Ok)
            }
            Command::RemoveDeviceType { name } => {
                self.remove_device_type(&name).await?;
                Ok(CommandResult::Ok)
            }
        }
    }

    // ── Remote fan-out ───────────────────────────────────────────────

    async fn perform(&self, ap: &AccessPoint, step: RemoteStep<'_>, site: &SiteModel) -> Result<(), CoreError> {
        let agent = &self.inner.agent;
        match step {
            RemoteStep::PushSsid(ssid) => agent.push_ssid(ap, ssid, site).await,
            RemoteStep::RemoveSsid(ssid) => agent.remove_ssid(ap, ssid, site).await,
            RemoteStep::AddNeighbour(peer) => agent.add_neighbour(ap, peer, site).await,
            RemoteStep::RemoveNeighbour(peer) => agent.remove_neighbour(ap, peer, site).await,
        }
    }

    /// Apply `forward` to each target in order. On the first failure (or
    /// cancellation) undo the completed prefix in reverse and return the
    /// original error.
    async fn fan_out(
        &self,
        operation: &'static str,
        site: &SiteModel,
        targets: &[&AccessPoint],
        forward: RemoteStep<'_>,
        undo: RemoteStep<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        for (done, ap) in targets.iter().enumerate() {
            let outcome = match ensure_active(cancel) {
                Ok(()) => self.perform(ap, forward, site).await,
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(operation, ap = %ap.name, error = %err, completed = done, "step failed, compensating");
                self.compensate(operation, site, targets.get(..done).unwrap_or_default(), undo)
                    .await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Best-effort reverse-order undo. Not interrupted by cancellation.
    async fn compensate(&self, operation: &'static str, site: &SiteModel, done: &[&AccessPoint], undo: RemoteStep<'_>) {
        for ap in done.iter().rev() {
            if let Err(err) = self.perform(ap, undo, site).await {
                self.record_warning(operation, &ap.name, err);
            }
        }
    }

    // ── Access points ────────────────────────────────────────────────

    /// Bootstrap a new access point, give it every SSID, link it with
    /// every peer in both directions, then record it.
    pub async fn add_access_point(
        &self,
        req: AddAccessPointRequest,
        cancel: &CancellationToken,
    ) -> Result<AccessPoint, CoreError> {
        const OPERATION: &str = "add access point";
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();

        validate_name("access point", &req.name)?;
        let device = current.device(&req.model)?;
        if current.access_points.contains_key(&req.name) {
            return Err(CoreError::AlreadyExists {
                entity_type: "access point",
                identifier: req.name,
            });
        }
        if let Some(other) = current.access_points.values().find(|ap| ap.ip == req.ip) {
            return Err(CoreError::Conflict {
                message: format!("{} is already used by access point \"{}\"", req.ip, other.name),
            });
        }
        if current.password.is_none() {
            return Err(CoreError::Validation {
                message: "site has no admin password to rotate onto access points".into(),
            });
        }

        let mut ap = AccessPoint::new(req.name, device, req.ip, req.mac);
        ensure_active(cancel)?;
        let outcome = self
            .inner
            .agent
            .bootstrap(&ap, &current, req.trust_on_first_use)
            .await?;
        ap.trust = outcome.trust;
        ap.host_key = outcome.host_key;

        let provisioned = self.provision_new(&ap, &current, cancel).await;
        if let Err(err) = provisioned {
            self.record_warning(
                OPERATION,
                &ap.name,
                "bootstrapped with the site key and password but not recorded; reset it before retrying",
            );
            return Err(err);
        }

        let mut next = (*current).clone();
        for peer in next.access_points.values_mut() {
            peer.link(&ap.name);
            ap.link(&peer.name);
        }
        next.access_points.insert(ap.name.clone(), ap.clone());
        self.commit(next)?;

        info!(ap = %ap.name, peers = ap.neighbours.len(), "access point added");
        Ok(ap)
    }

    /// SSIDs and neighbour links for a freshly bootstrapped AP.
    async fn provision_new(
        &self,
        ap: &AccessPoint,
        site: &SiteModel,
        cancel: &CancellationToken,
    ) -> Result<(), CoreError> {
        const OPERATION: &str = "add access point";

        for ssid in &site.ssids {
            ensure_active(cancel)?;
            self.perform(ap, RemoteStep::PushSsid(ssid), site).await?;
        }

        let peers: Vec<&AccessPoint> = site.peers_of(&ap.name).collect();
        self.fan_out(
            OPERATION,
            site,
            &peers,
            RemoteStep::AddNeighbour(ap),
            RemoteStep::RemoveNeighbour(ap),
            cancel,
        )
        .await?;

        for peer in peers.iter().copied() {
            let outcome = match ensure_active(cancel) {
                Ok(()) => self.perform(ap, RemoteStep::AddNeighbour(peer), site).await,
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(ap = %ap.name, peer = %peer.name, error = %err, "linking new access point failed, compensating");
                self.compensate(OPERATION, site, &peers, RemoteStep::RemoveNeighbour(ap))
                    .await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Unlink an access point from every peer and forget it. Peers that
    /// cannot be reached are reported as warnings.
    pub async fn remove_access_point(&self, name: &str, cancel: &CancellationToken) -> Result<(), CoreError> {
        const OPERATION: &str = "remove access point";
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();
        let ap = current.access_point(name)?;

        let mut unlinked: Vec<&AccessPoint> = Vec::new();
        for peer in current.peers_of(name) {
            if let Err(err) = ensure_active(cancel) {
                self.compensate(OPERATION, &current, &unlinked, RemoteStep::AddNeighbour(ap))
                    .await;
                return Err(err);
            }
            match self.perform(peer, RemoteStep::RemoveNeighbour(ap), &current).await {
                Ok(()) => unlinked.push(peer),
                Err(err) => self.record_warning(OPERATION, &peer.name, err),
            }
        }

        let mut next = (*current).clone();
        next.access_points.remove(name);
        for peer in next.access_points.values_mut() {
            peer.unlink(name);
        }
        self.commit(next)?;

        info!(ap = name, "access point removed");
        Ok(())
    }

    /// Change channel and/or power of one radio and push it.
    pub async fn tune_access_point(
        &self,
        req: TuneRadioRequest,
        cancel: &CancellationToken,
    ) -> Result<AccessPoint, CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();
        let mut ap = current.access_point(&req.name)?.clone();

        let Some(radio) = ap.radio_mut(req.band) else {
            return Err(CoreError::Validation {
                message: format!("access point \"{}\" has no {} radio", req.name, req.band),
            });
        };
        if let Some(channel) = req.channel {
            if !req.band.accepts_channel(channel) {
                return Err(CoreError::Validation {
                    message: format!("channel {channel} is not valid on band {}", req.band),
                });
            }
            radio.channel = channel;
        }
        if let Some(power) = req.power {
            radio.power = power;
        }

        ensure_active(cancel)?;
        self.inner.agent.apply_radios(&ap, &current).await?;

        let mut next = (*current).clone();
        next.access_points.insert(ap.name.clone(), ap.clone());
        self.commit(next)?;
        info!(ap = %ap.name, band = %req.band, "radio tuned");
        Ok(ap)
    }

    // ── SSIDs ────────────────────────────────────────────────────────

    pub async fn add_ssid(&self, mut ssid: Ssid, cancel: &CancellationToken) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();

        ssid.validate()?;
        if current.ssid(&ssid.name).is_ok() {
            return Err(CoreError::AlreadyExists {
                entity_type: "SSID",
                identifier: ssid.name,
            });
        }
        dedup_stations(&mut ssid);

        let targets: Vec<&AccessPoint> = current.access_points.values().collect();
        self.fan_out(
            "add ssid",
            &current,
            &targets,
            RemoteStep::PushSsid(&ssid),
            RemoteStep::RemoveSsid(&ssid),
            cancel,
        )
        .await?;

        let mut next = (*current).clone();
        info!(ssid = %ssid.name, access_points = targets.len(), "ssid added");
        next.ssids.push(ssid);
        self.commit(next)?;
        Ok(())
    }

    /// Replace an SSID and push the new definition (stations included) to
    /// every access point. Already-updated devices get the old one back
    /// if a later device fails.
    pub async fn update_ssid(&self, mut ssid: Ssid, cancel: &CancellationToken) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();

        ssid.validate()?;
        let previous = current.ssid(&ssid.name)?;
        dedup_stations(&mut ssid);

        let targets: Vec<&AccessPoint> = current.access_points.values().collect();
        self.fan_out(
            "update ssid",
            &current,
            &targets,
            RemoteStep::PushSsid(&ssid),
            RemoteStep::PushSsid(previous),
            cancel,
        )
        .await?;

        let mut next = (*current).clone();
        let slot = next.ssid_mut(&ssid.name)?;
        *slot = ssid;
        self.commit(next)?;
        Ok(())
    }

    pub async fn remove_ssid(&self, name: &str, cancel: &CancellationToken) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();
        let ssid = current.ssid(name)?;

        let targets: Vec<&AccessPoint> = current.access_points.values().collect();
        self.fan_out(
            "remove ssid",
            &current,
            &targets,
            RemoteStep::RemoveSsid(ssid),
            RemoteStep::PushSsid(ssid),
            cancel,
        )
        .await?;

        let mut next = (*current).clone();
        next.ssids.retain(|s| s.name != name);
        self.commit(next)?;
        info!(ssid = name, "ssid removed");
        Ok(())
    }

    // ── Stations (model only) ────────────────────────────────────────

    /// Insert or replace a station by MAC. Pushed with the next SSID update.
    pub async fn add_station(&self, ssid: &str, station: Station) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let mut next = (*self.snapshot()).clone();
        let created = next.ssid_mut(ssid)?.upsert_station(station);
        self.commit(next)?;
        debug!(ssid, created, "station stored");
        Ok(())
    }

    pub async fn remove_station(&self, ssid: &str, mac: &MacAddress) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let mut next = (*self.snapshot()).clone();
        if next.ssid_mut(ssid)?.remove_station(mac).is_none() {
            return Err(CoreError::NotFound {
                entity_type: "station",
                identifier: mac.to_string(),
            });
        }
        self.commit(next)?;
        Ok(())
    }

    // ── Device catalog (model only) ──────────────────────────────────

    pub async fn add_device_type(&self, device: DeviceType) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();

        validate_name("device type", &device.name)?;
        if current.devices.contains_key(&device.name) {
            return Err(CoreError::AlreadyExists {
                entity_type: "device type",
                identifier: device.name,
            });
        }
        if device.wlan2.is_none() && device.wlan5.is_none() {
            return Err(CoreError::Validation {
                message: format!("device type \"{}\" has no radio", device.name),
            });
        }

        let mut next = (*current).clone();
        next.devices.insert(device.name.clone(), device);
        self.commit(next)?;
        Ok(())
    }

    pub async fn remove_device_type(&self, name: &str) -> Result<(), CoreError> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.snapshot();
        current.device(name)?;

        let users: Vec<&str> = current.users_of(name).map(|ap| ap.name.as_str()).collect();
        if !users.is_empty() {
            return Err(CoreError::Conflict {
                message: format!(
                    "device type \"{name}\" is used by access points: {}",
                    users.join(", ")
                ),
            });
        }

        let mut next = (*current).clone();
        next.devices.remove(name);
        self.commit(next)?;
        Ok(())
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), CoreError> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(())
}

fn validate_name(entity: &str, name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::Validation {
            message: format!("{entity} name \"{name}\" must be non-empty without whitespace"),
        });
    }
    Ok(())
}

/// Keep the last entry for each MAC, in first-seen position.
fn dedup_stations(ssid: &mut Ssid) {
    let stations = std::mem::take(&mut ssid.stations);
    for station in stations {
        ssid.upsert_station(station);
    }
}
