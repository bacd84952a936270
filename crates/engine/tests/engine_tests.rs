//! Engine integration tests
//!
//! Drive `UsbipHost` through scripted and stateful fake runners, plus one
//! real-process run for timeout handling.
//!
//! Run with: `cargo test -p engine --test engine_tests`

use common::test_utils::{
    ALREADY_BOUND_STDERR, DOCTOR_FULL, DOCTOR_LOCAL_DEVICES, LSUSB, USBIP_LIST_LOCAL,
    USBIP_LIST_REMOTE, USBIP_PORT,
};
use common::{DiscoverySource, DiscoveryStatus, ErrorKind, EventKind};
use engine::test_utils::{FakeUsbip, ScriptedRunner, test_config, test_host};
use engine::{DetectionMethod, ToolPaths};
use std::fs;
use std::path::Path;

fn add_sysfs_device(root: &Path, busid: &str, vid: &str, pid: &str) {
    let dir = root.join("devices").join(busid);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("idVendor"), format!("{vid}\n")).unwrap();
    fs::write(dir.join("idProduct"), format!("{pid}\n")).unwrap();
}

mod publishing {
    use super::*;

    fn fake(root: &Path) -> FakeUsbip {
        FakeUsbip::new()
            .with_device("1-1", "abcd", "1234", "LogiLink : UDisk flash drive")
            .with_device("1-6", "04f3", "22e8", "Elan Microelectronics Corp. : unknown product")
            .mirror_driver_dir(root.join("drivers/usbip-host"))
    }

    #[tokio::test]
    async fn test_bind_then_unbind_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let (host, sink) = test_host(fake(root.path()), test_config(root.path()));

        assert!(!host.published_busids().await.contains("1-1"));

        let outcome = host.bind("1-1").await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(!outcome.already_in_state);
        assert!(host.published_busids().await.contains("1-1"));
        assert_eq!(sink.count(EventKind::DeviceBound), 1);

        let outcome = host.unbind("1-1").await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(!host.published_busids().await.contains("1-1"));
        assert_eq!(sink.count(EventKind::DeviceUnbound), 1);
    }

    #[tokio::test]
    async fn test_bind_accepts_padded_busid() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(fake(root.path()), test_config(root.path()));

        assert!(host.bind("001-006").await.success);
        assert!(host.runner().is_bound("1-6"));
        assert!(host.runner().commands().contains(&"usbip bind -b 1-6".to_string()));
    }

    #[tokio::test]
    async fn test_bind_already_bound_is_success() {
        let root = tempfile::tempdir().unwrap();
        let (host, sink) = test_host(
            fake(root.path()).with_bound("1-1"),
            test_config(root.path()),
        );

        let outcome = host.bind("1-1").await;
        assert!(outcome.success);
        assert!(outcome.already_in_state);
        assert!(outcome.error.is_none());
        assert!(host.runner().is_bound("1-1"));
        assert_eq!(sink.count(EventKind::DeviceBound), 0);

        // Idempotent on repeat
        assert!(host.bind("1-1").await.already_in_state);
    }

    #[tokio::test]
    async fn test_bind_unknown_device() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(fake(root.path()), test_config(root.path()));

        let outcome = host.bind("9-9").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::DeviceNotFound));
        assert_eq!(host.runner().count("usbip bind"), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_option_like_busid() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(fake(root.path()), test_config(root.path()));

        let outcome = host.bind("--help").await;
        assert_eq!(outcome.error, Some(ErrorKind::InvalidInput));
        assert!(host.runner().commands().is_empty());
    }

    #[tokio::test]
    async fn test_unbind_requires_published_device() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(fake(root.path()), test_config(root.path()));

        let outcome = host.unbind("1-6").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::NotPublished));
        assert_eq!(host.runner().count("usbip unbind"), 0);
    }

    #[tokio::test]
    async fn test_inventory_reflects_publish_state() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(
            fake(root.path()).with_bound("1-6"),
            test_config(root.path()),
        );

        let devices = host.list_local_devices().await;
        assert_eq!(devices.len(), 2);
        let published: Vec<&str> = devices
            .iter()
            .filter(|d| d.is_published)
            .map(|d| d.busid.as_str())
            .collect();
        assert_eq!(published, vec!["1-6"]);
    }
}

mod discovery {
    use super::*;

    #[tokio::test]
    async fn test_no_devices_yields_single_info_record() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("usbip list -l", "").on(
            "lsusb",
            "Bus 001 Device 001: ID 1d6b:0002 Linux Foundation 2.0 root hub\n",
        );
        let (host, _) = test_host(runner, test_config(root.path()));

        let discovery = host.discover().await;
        assert!(matches!(discovery.status, DiscoveryStatus::Empty { .. }));

        let list = discovery.into_display_list();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_info());
        assert!(!list[0].is_error());
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_error_record() {
        let root = tempfile::tempdir().unwrap();
        let (host, sink) = test_host(ScriptedRunner::new(), test_config(root.path()));

        let list = host.list_local_devices().await;
        assert_eq!(list.len(), 1);
        assert!(list[0].is_error());
        assert!(
            list[0]
                .details
                .iter()
                .any(|d| d.starts_with("Error details:"))
        );
        assert_eq!(sink.count(EventKind::DiscoveryFailed), 1);
    }

    #[tokio::test]
    async fn test_error_reason_names_every_failed_source() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on_failure("usbip list -l", 2, "usbip: error: failed to open usb.ids\n")
            .on_failure("lsusb", 1, "lsusb: cannot open /dev/bus/usb\n");
        let (host, _) = test_host(runner, test_config(root.path()));

        match host.discover().await.status {
            DiscoveryStatus::Error { reason, .. } => {
                assert!(reason.contains("failed to open usb.ids"), "{reason}");
                assert!(reason.contains("cannot open /dev/bus/usb"), "{reason}");
                let usbip = reason.find("usb.ids").unwrap();
                let lsusb = reason.find("/dev/bus/usb").unwrap();
                assert!(usbip < lsusb);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_diagnostic_script_takes_priority() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on("bash doctor.sh --local-devices", DOCTOR_LOCAL_DEVICES)
            .on("bash doctor.sh", DOCTOR_FULL)
            .on("usbip list -l", USBIP_LIST_LOCAL);
        let (host, _) = test_host(runner, test_config(root.path()));
        let host = host.with_tools(ToolPaths::bare().with_doctor_script("doctor.sh"));

        let discovery = host.discover().await;
        assert_eq!(discovery.source, Some(DiscoverySource::DiagnosticScript));
        assert_eq!(discovery.devices.len(), 2);

        let first = &discovery.devices[0];
        assert_eq!(first.busid, "1-1");
        assert!(first.is_published);
        assert!(!discovery.devices[1].is_published);
        assert!(!host.runner().ran("usbip list -l"));
    }

    #[tokio::test]
    async fn test_failing_script_falls_through_to_usbip() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on_failure("bash doctor.sh --local-devices", 2, "doctor.sh: unknown option")
            .on("usbip list -l", USBIP_LIST_LOCAL)
            .on("lsusb", LSUSB);
        let (host, _) = test_host(runner, test_config(root.path()));
        let host = host.with_tools(ToolPaths::bare().with_doctor_script("doctor.sh"));

        let discovery = host.discover().await;
        assert_eq!(discovery.source, Some(DiscoverySource::UsbipList));
        assert_eq!(discovery.devices.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_names_enriched_from_lsusb() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.discovery.probe_by_bind = false;
        let runner = ScriptedRunner::new()
            .on("usbip list -l", USBIP_LIST_LOCAL)
            .on("lsusb", LSUSB);
        let (host, _) = test_host(runner, config);

        let devices = host.discover().await.devices;
        let elan = devices.iter().find(|d| d.busid == "1-6").unwrap();
        assert_eq!(elan.device_name, "Elan Microelectronics Corp. ELAN:Fingerprint");
        assert!(elan.details.iter().any(|d| d.starts_with("usbip name:")));
        assert!(!elan.is_fallback);
    }

    #[tokio::test]
    async fn test_lsusb_fallback_rekeys_unique_matches() {
        let root = tempfile::tempdir().unwrap();
        add_sysfs_device(root.path(), "1-4", "062a", "4101");
        let runner = ScriptedRunner::new()
            .on("usbip list -l", "")
            .on("lsusb", LSUSB);
        let (host, sink) = test_host(runner, test_config(root.path()));

        let discovery = host.discover().await;
        assert_eq!(discovery.source, Some(DiscoverySource::Lsusb));

        let busids: Vec<&str> = discovery.devices.iter().map(|d| d.busid.as_str()).collect();
        // Bus 001 Device 005 is re-keyed through sysfs; Device 006 has no
        // sysfs match and keeps its slot.
        assert_eq!(busids, vec!["1-4", "1-6"]);
        assert!(discovery.devices.iter().all(|d| d.is_fallback));
        assert!(discovery.devices.iter().all(|d| !d.is_published));
        assert_eq!(sink.count(EventKind::DiscoveryFallback), 1);
    }
}

mod publish_detection {
    use super::*;

    #[tokio::test]
    async fn test_probe_restores_unbound_devices() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on("usbip list -l", USBIP_LIST_LOCAL)
            .on("lsusb", LSUSB)
            .on_failure("usbip bind -b 1-1.4", 1, ALREADY_BOUND_STDERR)
            .on("usbip bind -b 1-6", "")
            .on("usbip unbind -b 1-6", "");
        let (host, sink) = test_host(runner, test_config(root.path()));

        let report = host.published_report().await;
        assert_eq!(report.methods, vec![DetectionMethod::BindProbe]);
        assert!(report.contains("1-1.4"));
        assert!(!report.contains("1-6"));
        assert!(host.runner().ran("usbip unbind -b 1-6"));
        assert_eq!(sink.count(EventKind::ProbeMutation), 1);
    }

    #[tokio::test]
    async fn test_probe_disabled() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.discovery.probe_by_bind = false;
        let runner = ScriptedRunner::new().on("usbip list -l", USBIP_LIST_LOCAL);
        let (host, _) = test_host(runner, config);

        assert!(host.published_busids().await.is_empty());
        assert!(!host.runner().commands().iter().any(|c| c.starts_with("usbip bind")));
    }

    #[tokio::test]
    async fn test_unreadable_driver_dir_uses_ls() {
        let root = tempfile::tempdir().unwrap();
        let driver_dir = root.path().join("drivers/usbip-host");
        let ls = format!("ls -la {}", driver_dir.display());
        let runner = ScriptedRunner::new().on(&ls, common::test_utils::DRIVER_DIR_LISTING);
        let (host, _) = test_host(runner, test_config(root.path()));

        let report = host.published_report().await;
        assert_eq!(report.methods, vec![DetectionMethod::DriverDirectory]);
        assert_eq!(
            report.busids.into_iter().collect::<Vec<_>>(),
            vec!["1-1".to_string(), "1-1.4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sources_are_unioned() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("drivers/usbip-host/3-2")).unwrap();
        let runner = ScriptedRunner::new().on("bash doctor.sh", DOCTOR_FULL);
        let (host, _) = test_host(runner, test_config(root.path()));
        let host = host.with_tools(ToolPaths::bare().with_doctor_script("doctor.sh"));

        let report = host.published_report().await;
        assert_eq!(
            report.methods,
            vec![DetectionMethod::DriverDirectory, DetectionMethod::DiagnosticScript]
        );
        assert_eq!(
            report.busids.into_iter().collect::<Vec<_>>(),
            vec!["1-1".to_string(), "3-2".to_string()]
        );
    }
}

mod remote_and_ports {
    use super::*;

    #[tokio::test]
    async fn test_attach_sanitizes_host() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("usbip attach -r 192.168.1.5 -b 1-1", "");
        let (host, sink) = test_host(runner, test_config(root.path()));

        let outcome = host.attach("http://192.168.1.5:3240/", "1-1").await;
        assert!(outcome.success, "{}", outcome.message);

        let calls = host.runner().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["attach", "-r", "192.168.1.5", "-b", "1-1"]);
        assert!(calls[0].privileged);
        assert!(calls[0].interactive);
        assert_eq!(sink.count(EventKind::DeviceAttached), 1);
    }

    #[tokio::test]
    async fn test_attach_empty_host() {
        let root = tempfile::tempdir().unwrap();
        let (host, _) = test_host(ScriptedRunner::new(), test_config(root.path()));

        let outcome = host.attach("http://", "1-1").await;
        assert_eq!(outcome.error, Some(ErrorKind::InvalidInput));
        assert!(host.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_attach_failure_carries_stderr() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on_failure(
            "usbip attach -r 10.0.0.9 -b 1-1",
            1,
            "sudo: unable to resolve host box: Name or service not known\n\
             usbip: error: tcp connect\n",
        );
        let (host, _) = test_host(runner, test_config(root.path()));

        let outcome = host.attach("10.0.0.9", "1-1").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ErrorKind::ToolFailure));
        assert!(outcome.message.contains("unable to resolve host"));
        assert!(outcome.message.contains("usbip: error: tcp connect"));
    }

    #[tokio::test]
    async fn test_attach_detach_with_fake() {
        let root = tempfile::tempdir().unwrap();
        let (host, sink) = test_host(FakeUsbip::new(), test_config(root.path()));

        assert!(host.attach("pi.local", "1-1.4").await.success);
        let ports = host.list_ports().await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].remote_host.as_deref(), Some("pi.local"));
        assert_eq!(ports[0].remote_busid.as_deref(), Some("1-1.4"));

        let outcome = host.detach(&ports[0].port).await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(host.list_ports().await.unwrap().is_empty());
        assert_eq!(sink.count(EventKind::DeviceDetached), 1);
    }

    #[tokio::test]
    async fn test_list_ports() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("usbip port", USBIP_PORT);
        let (host, _) = test_host(runner, test_config(root.path()));

        let ports = host.list_ports().await.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].remote_host.as_deref(), Some("192.168.1.5"));
    }

    #[tokio::test]
    async fn test_list_remote() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("usbip list -r 192.168.1.5", USBIP_LIST_REMOTE);
        let (host, _) = test_host(runner, test_config(root.path()));

        let devices = host.list_remote("192.168.1.5:3240").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].busid, "1-1.4");
    }

    #[tokio::test]
    async fn test_list_remote_connection_error() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on_failure(
            "usbip list -r 10.0.0.9",
            1,
            "usbip: error: could not connect to 10.0.0.9:3240\n",
        );
        let (host, _) = test_host(runner, test_config(root.path()));

        let error = host.list_remote("10.0.0.9").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ToolFailure);
    }
}

#[cfg(unix)]
mod timeouts {
    use super::*;
    use common::MemorySink;
    use engine::{SystemRunner, UsbipHost};
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_hanging_tools_do_not_hang_discovery() {
        let root = tempfile::tempdir().unwrap();
        let script = root.path().join("usbip");
        fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = test_config(root.path());
        config.timeouts.command = Duration::from_millis(300);
        config.privilege.enabled = false;
        config.discovery.use_diagnostic_script = false;
        config.tools.usbip = Some(script.clone());
        config.tools.lsusb = Some(script);

        let sink = Arc::new(MemorySink::new());
        let host =
            UsbipHost::new(SystemRunner::from_config(&config), config).with_sink(sink.clone());

        let start = Instant::now();
        let list = host.list_local_devices().await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(list.len(), 1);
        assert!(list[0].is_error());
        assert_eq!(sink.count(EventKind::CommandTimedOut), 2);
    }
}
