//! Unit tests for the host service

use super::*;
use crate::domain::{AccountRecord, OsType};
use crate::port::account_repository::mocks::InMemoryAccountRepository;
use crate::port::command_catalog::mocks::StaticCatalog;
use crate::port::host_repository::mocks::InMemoryHostRepository;
use crate::port::simulated_host::{SimulatedConnector, SimulatedHost};
use crate::port::time_provider::mocks::ManualTimeProvider;
use crate::port::transport::mocks::ScriptedConnector;
use crate::port::transport::{ConnectParams, ExecFailure, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn record(address: &str, name: &str) -> HostRecord {
    HostRecord::new(HostAddr::new(address, 22), name, "ops", "adm1n!")
}

struct Fixture {
    service: HostService,
    hosts: Arc<InMemoryHostRepository>,
    accounts: Arc<InMemoryAccountRepository>,
    clock: Arc<ManualTimeProvider>,
}

fn fixture(connector: Arc<dyn Connector>, hosts: Vec<HostRecord>, accounts: Vec<AccountRecord>) -> Fixture {
    let hosts = Arc::new(InMemoryHostRepository::with_hosts(hosts));
    let accounts = Arc::new(InMemoryAccountRepository::with_accounts(accounts));
    let clock = Arc::new(ManualTimeProvider::new(1_700_000_000_000));
    let service = HostService::new(
        hosts.clone(),
        accounts.clone(),
        connector,
        Arc::new(StaticCatalog::linux()),
        clock.clone(),
    );
    Fixture {
        service,
        hosts,
        accounts,
        clock,
    }
}

fn connector_for(hosts: Vec<(&HostRecord, Arc<SimulatedHost>)>) -> Arc<SimulatedConnector> {
    let connector = hosts
        .into_iter()
        .fold(SimulatedConnector::new(), |connector, (record, host)| {
            connector.with_host(record.addr.clone(), host)
        });
    Arc::new(connector)
}

#[tokio::test]
async fn test_host_info_reconciles_and_isolates_sections() {
    let lab = record("10.2.0.1", "lab-1");
    let sim = Arc::new(SimulatedHost::ubuntu().with_user("alice").with_user("bob"));
    let stored = AccountRecord::new(lab.addr.clone(), "carol", "Carol123");
    let f = fixture(connector_for(vec![(&lab, sim.clone())]), vec![lab.clone()], vec![stored]);

    let options = LoadOptions {
        with_accounts: true,
        with_remote_access: true,
        ..Default::default()
    };
    let info = f.service.host_info(&lab.addr, options).await.unwrap();

    assert!(info.access_failure.is_none());
    assert_eq!(info.host.admin_secret, "");

    let accounts = info.accounts.unwrap();
    assert!(accounts.failure.is_none());
    let names: Vec<&str> = accounts.value.as_ref().unwrap().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["carol", "alice", "bob"]);
    assert!(accounts.value.as_ref().unwrap()[0].not_found_on_remote);

    // `w` is unknown to the simulated host; only its own section fails
    let sessions = info.remote_access.unwrap();
    assert!(sessions.failure.is_some());
    assert!(sessions.output.contains("command not found"));
    assert!(info.hardware.is_none());

    let upserts = f.accounts.upsert_calls();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].len(), 2);
}

#[tokio::test]
async fn test_ignore_stored_skips_reconciliation() {
    let lab = record("10.2.0.2", "lab-2");
    let sim = Arc::new(SimulatedHost::ubuntu().with_user("alice"));
    let stored = AccountRecord::new(lab.addr.clone(), "carol", "Carol123");
    let f = fixture(connector_for(vec![(&lab, sim)]), vec![lab.clone()], vec![stored]);

    let options = LoadOptions {
        with_accounts: true,
        with_accounts_ignore_stored: true,
        ..Default::default()
    };
    let info = f.service.host_info(&lab.addr, options).await.unwrap();

    let accounts = info.accounts.unwrap().value.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "alice");
    assert!(f.accounts.upsert_calls().is_empty());
}

#[tokio::test]
async fn test_unreachable_host_reports_access_failure() {
    let lab = record("10.2.0.3", "lab-3");
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![lab.clone()], vec![]);

    let info = f.service.host_info(&lab.addr, LoadOptions::all()).await.unwrap();
    assert!(info.access_failure.unwrap().contains("cannot open session"));
    assert!(info.accounts.is_none());
    assert!(info.hardware.is_none());
    assert!(info.gpu_usages.is_none());
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![], vec![]);
    let err = f
        .service
        .host_info(&HostAddr::new("10.9.9.9", 22), LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_host_infos_keeps_stored_order() {
    let a = record("10.3.0.1", "a");
    let b = record("10.3.0.2", "b");
    let c = record("10.3.0.3", "c");
    let connector = connector_for(vec![
        (&a, Arc::new(SimulatedHost::ubuntu().with_user("ann"))),
        (&c, Arc::new(SimulatedHost::ubuntu().with_user("cid"))),
    ]);
    let f = fixture(connector, vec![a.clone(), b.clone(), c.clone()], vec![]);

    let options = LoadOptions {
        with_accounts: true,
        ..Default::default()
    };
    let (infos, total) = f.service.host_infos(0, 10, None, options).await.unwrap();

    assert_eq!(total, 3);
    let order: Vec<&HostAddr> = infos.iter().map(|i| &i.host.addr).collect();
    assert_eq!(order, vec![&a.addr, &b.addr, &c.addr]);
    assert!(infos[0].access_failure.is_none());
    assert!(infos[1].access_failure.is_some());
    assert!(infos[2].access_failure.is_none());
    assert_eq!(infos[2].accounts.as_ref().unwrap().value.as_ref().unwrap()[0].name, "cid");
}

#[tokio::test]
async fn test_host_infos_pages_and_filters() {
    let hosts = vec![record("10.4.0.1", "gpu-1"), record("10.4.0.2", "gpu-2"), record("10.4.0.3", "cpu-1")];
    let f = fixture(Arc::new(ScriptedConnector::new()), hosts, vec![]);

    let (infos, total) = f
        .service
        .host_infos(1, 5, Some("gpu"), LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].host.name, "gpu-2");
}

/// Transport that tracks how many commands are in flight at once
struct GaugedTransport {
    inner: Arc<SimulatedHost>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Transport for GaugedTransport {
    async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.send(commands).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

struct GaugedConnector(Arc<GaugedTransport>);

#[async_trait]
impl Connector for GaugedConnector {
    async fn connect(&self, _params: &ConnectParams) -> crate::Result<Arc<dyn Transport>> {
        Ok(self.0.clone() as Arc<dyn Transport>)
    }
}

#[tokio::test]
async fn test_backup_lookups_bounded_per_batch() {
    let lab = record("10.5.0.1", "lab-5");
    let sim = (0..12).fold(SimulatedHost::ubuntu(), |sim, i| sim.with_user(&format!("user{:02}", i)));
    let gauged = Arc::new(GaugedTransport {
        inner: Arc::new(sim.with_dir("/backup/user03.backup")),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let f = fixture(Arc::new(GaugedConnector(gauged.clone())), vec![lab.clone()], vec![]);

    let options = LoadOptions {
        with_accounts: true,
        with_backup_dir_info: true,
        ..Default::default()
    };
    let info = f.service.host_info(&lab.addr, options).await.unwrap();

    let accounts = info.accounts.unwrap().value.unwrap();
    assert_eq!(accounts.len(), 12);
    for account in &accounts {
        let dir = account.backup_dir.as_ref().unwrap().value.as_ref().unwrap();
        assert_eq!(dir.backup_dir, format!("/backup/{}.backup", account.name));
        assert_eq!(dir.dir_exists, account.name == "user03");
    }
    assert_eq!(gauged.peak.load(Ordering::SeqCst), 5);
    assert!(gauged.inner.is_closed());
}

#[tokio::test]
async fn test_register_host_persists_after_connection_test() {
    let lab = record("10.6.0.1", "lab-6");
    let sim = Arc::new(SimulatedHost::ubuntu());
    let f = fixture(connector_for(vec![(&lab, sim.clone())]), vec![], vec![]);

    let registered = f.service.register_host(lab.clone()).await.unwrap();
    assert_eq!(registered.admin_secret, "");
    assert_eq!(registered.created_at, 1_700_000_000_000);

    let stored = f.hosts.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].admin_secret, "adm1n!");
    assert_eq!(sim.sent(), vec!["sudo id -u", "cat /etc/os-release"]);
}

#[tokio::test]
async fn test_register_unreachable_host_stores_nothing() {
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![], vec![]);
    let err = f.service.register_host(record("10.6.0.2", "lab-7")).await.unwrap_err().error;
    assert!(matches!(err, AppError::Connection(_)));
    assert!(f.hosts.all().is_empty());
}

#[tokio::test]
async fn test_register_rejects_invalid_records_before_dialing() {
    let connector = Arc::new(ScriptedConnector::new());
    let f = fixture(connector.clone(), vec![], vec![]);

    let err = f.service.register_host(record("10.6.0.3", " ")).await.unwrap_err().error;
    assert!(matches!(err, AppError::Validation(_)));

    let mut windows = record("10.6.0.4", "win-1");
    windows.os_type = OsType::WindowsServer;
    let err = f.service.register_host(windows).await.unwrap_err().error;
    assert!(matches!(err, AppError::Validation(_)));

    assert!(connector.connects().is_empty());
    assert!(f.hosts.all().is_empty());
}

#[tokio::test]
async fn test_register_duplicate_conflicts() {
    let lab = record("10.6.0.5", "lab-8");
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![lab.clone()], vec![]);
    let err = f.service.register_host(lab).await.unwrap_err().error;
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_update_host_keeps_creation_time() {
    let mut lab = record("10.7.0.1", "lab-9");
    lab.created_at = 42;
    let f = fixture(
        connector_for(vec![(&lab, Arc::new(SimulatedHost::ubuntu()))]),
        vec![lab.clone()],
        vec![],
    );
    f.clock.advance_millis(5_000);

    let mut changed = lab.clone();
    changed.description = "rack 4".to_string();
    changed.created_at = 0;
    let updated = f.service.update_host(changed).await.unwrap();

    assert_eq!(updated.created_at, 42);
    assert_eq!(updated.updated_at, 1_700_000_005_000);
    assert_eq!(f.hosts.all()[0].description, "rack 4");
}

#[tokio::test]
async fn test_update_unknown_host_is_not_found() {
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![], vec![]);
    let err = f.service.update_host(record("10.7.0.2", "lab-10")).await.unwrap_err().error;
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_host() {
    let lab = record("10.8.0.1", "lab-11");
    let f = fixture(Arc::new(ScriptedConnector::new()), vec![lab.clone()], vec![]);

    f.service.delete_host(&lab.addr).await.unwrap();
    assert!(f.hosts.all().is_empty());
    let err = f.service.delete_host(&lab.addr).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_connection_test_reports_family() {
    let lab = record("10.8.0.2", "lab-12");
    let centos = SimulatedHost::with_os_release("NAME=\"CentOS Linux\"\nID=\"centos\"\n");
    let f = fixture(connector_for(vec![(&lab, Arc::new(centos))]), vec![lab.clone()], vec![]);

    assert_eq!(f.service.connection_test(&lab.addr).await.unwrap(), OsFamily::CentOS);
}

#[tokio::test]
async fn test_connection_test_without_sudo_fails() {
    let lab = record("10.8.0.3", "lab-13");
    let sim = Arc::new(SimulatedHost::ubuntu().unprivileged());
    let f = fixture(connector_for(vec![(&lab, sim)]), vec![lab.clone()], vec![]);

    let err = f.service.connection_test(&lab.addr).await.unwrap_err().error;
    assert!(matches!(err, AppError::Connection(_)));
}
