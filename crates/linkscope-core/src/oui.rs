//! Static OUI-to-vendor table
//!
//! A small sample of common vendors, not a full IEEE registry.

use crate::device::MacAddr;

const OUI_TABLE: &[(&str, &str)] = &[
    ("00:0c:29", "VMware"),
    ("00:50:56", "VMware"),
    ("ac:de:48", "Apple"),
    ("b8:27:eb", "Raspberry Pi"),
    ("dc:a6:32", "Raspberry Pi"),
    ("00:25:90", "Cisco"),
    ("00:16:3e", "Xen"),
    ("f8:1a:67", "TP-Link"),
    ("00:11:32", "Synology"),
    ("74:da:38", "Edimax"),
    ("00:21:29", "Cisco-Linksys"),
    ("f0:9f:c2", "Ubiquiti"),
    ("3c:7c:3f", "Huawei"),
    ("2c:54:cf", "LG Electronics"),
    ("40:b0:76", "ASUSTek"),
    ("00:e0:4c", "REALTEK"),
    ("94:10:3e", "Belkin"),
    ("18:b4:30", "Nest"),
    ("fc:fc:48", "Apple"),
    ("a8:8e:24", "Apple"),
    ("70:4d:7b", "Apple"),
    ("58:40:4e", "Apple"),
    ("ac:bc:32", "Apple"),
    ("fe:c4:e5", "Samsung"),
    ("18:67:b0", "Samsung"),
];

/// Vendor for a resolved MAC address; `None` for the unknown sentinel
pub fn lookup_vendor(mac: &MacAddr) -> Option<&'static str> {
    if mac.is_unknown() {
        return None;
    }
    lookup_prefix(&mac.oui_prefix())
}

/// Vendor for a textual MAC or prefix, matched on its first 8 characters
/// case-insensitively
pub fn lookup_prefix(mac: &str) -> Option<&'static str> {
    let prefix = mac.get(..8)?.to_ascii_lowercase().replace('-', ":");
    OUI_TABLE
        .iter()
        .find(|(oui, _)| *oui == prefix)
        .map(|(_, vendor)| *vendor)
}
