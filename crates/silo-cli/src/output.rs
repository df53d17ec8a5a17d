//! Table and summary renderers shared by command handlers.

use silo_model::device::Device;
use silo_model::link::{LinkAction, LinkPlan};
use silo_model::payload::TorrentInstance;

pub(crate) fn device_table(devices: &[Device]) {
    println!("{:<4} {:<10} {:<24} {:<36} {:>10} {:>14}", "ID", "ALIAS", "IDENT", "MOUNT", "FILES", "BYTES");
    for device in devices {
        println!(
            "{:<4} {:<10} {:<24} {:<36} {:>10} {:>14}",
            device.id.0,
            device.alias.as_deref().unwrap_or("-"),
            device.device_ident,
            device.relpath_base(),
            device.file_count,
            device.byte_total,
        );
    }
}

pub(crate) fn device_detail(device: &Device) {
    println!("id: {}", device.id.0);
    println!("fs_uuid: {}", device.fs_uuid);
    println!("device_ident: {}", device.device_ident);
    println!("alias: {}", device.alias.as_deref().unwrap_or("-"));
    println!("mount_point: {}", device.mount_point);
    if let Some(preferred) = &device.preferred_mount_point {
        println!("preferred_mount_point: {preferred}");
    }
    println!("fs_type: {}", device.fs_type);
    println!("file_count: {}", device.file_count);
    println!("byte_total: {}", device.byte_total);
    println!("first_scan_at: {}", device.first_scan_at);
    println!("last_scan_at: {}", device.last_scan_at);
    println!("scan_count: {}", device.scan_count);
    if !device.identifier_history.is_empty() {
        println!("identifier_history:");
        for change in &device.identifier_history {
            println!("  {} -> {} at {}", change.old_ident, change.new_ident, change.changed_at);
        }
    }
}

pub(crate) fn torrent_instance_table(instances: &[TorrentInstance]) {
    println!("{:<42} {:<12} {:<66} {:<20}", "INFOHASH", "DEVICE", "PAYLOAD_HASH", "CONTENT_ROOT");
    for instance in instances {
        println!(
            "{:<42} {:<12} {:<66} {:<20}",
            instance.infohash,
            instance.device_id.0,
            instance.payload_hash.as_deref().unwrap_or("-"),
            instance.content_root,
        );
    }
}

pub(crate) fn link_plan_summary(plan: &LinkPlan) {
    println!("name: {}", plan.name);
    println!("device: {}", plan.device_id.0);
    println!("status: {:?}", plan.status);
    println!("action_count: {}", plan.action_count);
    println!("total_bytes_to_save: {}", plan.total_bytes_to_save);
    println!("created_at: {}", plan.created_at);
    println!("updated_at: {}", plan.updated_at);
}

pub(crate) fn link_action_table(actions: &[LinkAction]) {
    println!(
        "{:<10} {:<10} {:<50} {:<50} {:>14}",
        "KIND", "STATUS", "CANONICAL", "DUPLICATE", "SAVED"
    );
    for action in actions {
        let saved = action.actual_bytes_saved.map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:<10?} {:<10?} {:<50} {:<50} {:>14}",
            action.kind, action.status, action.canonical_path, action.duplicate_path, saved,
        );
        if let Some(error) = &action.error {
            println!("  error: {error}");
        }
    }
}
