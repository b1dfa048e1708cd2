//! Kubernetes resource quantity parsing.
//!
//! Resource specs and metrics payloads both express amounts as quantity
//! strings (`"100m"`, `"1"`, `"128Mi"`). CPU normalizes to millicores,
//! memory to bytes. Unknown or malformed quantities parse as zero;
//! callers gate on non-zero amounts before interpreting ratios.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const KI: u64 = 1024;

/// Parse a CPU quantity string into millicores.
pub fn cpu_millis(quantity: &str) -> u64 {
    let quantity = quantity.trim();

    if let Some(val) = quantity.strip_suffix('n') {
        val.parse::<u64>().map(|n| n / 1_000_000).unwrap_or(0)
    } else if let Some(val) = quantity.strip_suffix('u') {
        val.parse::<u64>().map(|u| u / 1_000).unwrap_or(0)
    } else if let Some(val) = quantity.strip_suffix('m') {
        val.parse::<u64>().unwrap_or(0)
    } else {
        // Whole cores, possibly fractional.
        quantity
            .parse::<f64>()
            .map(|cores| (cores * 1000.0).round() as u64)
            .unwrap_or(0)
    }
}

/// Parse a memory quantity string into bytes.
pub fn mem_bytes(quantity: &str) -> u64 {
    const BINARY: [(&str, u64); 4] = [
        ("Ki", KI),
        ("Mi", KI * KI),
        ("Gi", KI * KI * KI),
        ("Ti", KI * KI * KI * KI),
    ];
    const DECIMAL: [(&str, u64); 3] = [
        ("k", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
    ];

    let quantity = quantity.trim();

    for (suffix, scale) in BINARY {
        if let Some(val) = quantity.strip_suffix(suffix) {
            return val.parse::<u64>().map(|v| v * scale).unwrap_or(0);
        }
    }
    for (suffix, scale) in DECIMAL {
        if let Some(val) = quantity.strip_suffix(suffix) {
            return val.parse::<u64>().map(|v| v * scale).unwrap_or(0);
        }
    }

    // Plain bytes.
    quantity.parse::<u64>().unwrap_or(0)
}

/// CPU millicores from a typed quantity.
pub fn quantity_cpu(quantity: &Quantity) -> u64 {
    cpu_millis(&quantity.0)
}

/// Memory bytes from a typed quantity.
pub fn quantity_mem(quantity: &Quantity) -> u64 {
    mem_bytes(&quantity.0)
}

/// Render millicores the way `kubectl` does.
pub fn format_cpu(millis: u64) -> String {
    if millis >= 1000 && millis % 1000 == 0 {
        format!("{}", millis / 1000)
    } else {
        format!("{}m", millis)
    }
}

/// Render bytes in binary units.
pub fn format_mem(bytes: u64) -> String {
    const MI: u64 = KI * KI;
    const GI: u64 = KI * KI * KI;
    if bytes >= GI && bytes % GI == 0 {
        format!("{}Gi", bytes / GI)
    } else {
        format!("{}Mi", bytes / MI)
    }
}
