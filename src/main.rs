#[cfg(target_os = "espidf")]
use easy_config::{
    captive_portal::EspPortalServices, nvs::NvsBackend, EntryInfo, PortalConfig, PortalSession,
    Registry,
};

#[cfg(target_os = "espidf")]
static SCHEMA: [EntryInfo; 5] = [
    EntryInfo::string("WiFi SSID", "ssid"),
    EntryInfo::string("WiFi Password", "pass"),
    EntryInfo::string("Server URL", "server_url"),
    EntryInfo::integer("Report Interval (s)", "interval"),
    EntryInfo::boolean("Enable Reporting", "report"),
];

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    let peripherals = esp_idf_svc::hal::prelude::Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    static AP_SSID: Option<&str> = std::option_env!("EASY_CONFIG_AP_SSID");
    let mut config = PortalConfig::default();
    if let Some(ssid) = AP_SSID {
        config = config.with_ssid(ssid);
    }
    log::info!("AP SSID: {:?}", config.ap_ssid);

    let registry = Registry::new(&SCHEMA)?;
    let mut session = PortalSession::new(registry, NvsBackend::take()?, config.clone());

    let complete = match session.load() {
        Ok(complete) => complete,
        Err(e) => {
            log::error!("Failed to load config: {}", e);
            false
        }
    };

    // 按住 BOOT 键上电强制进入配网
    let button = esp_idf_svc::hal::gpio::PinDriver::input(peripherals.pins.gpio0)?;
    let button_pressed = button.is_low();

    if !complete || button_pressed {
        log::info!(
            "Starting Web provisioning (config complete: {}, button: {})",
            complete,
            button_pressed
        );
        log_heap();

        let mut services = EspPortalServices::new(peripherals.modem, sysloop, config);
        session.start_portal(&mut services)?;

        log::info!("Configuration saved, restarting...");
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    session.with_registry(|registry| {
        for (index, info) in registry.schema().iter().enumerate() {
            log::info!("{}: {:?}", info.id, registry.value(index));
        }
    });

    log_heap();
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn log_heap() {
    unsafe {
        use esp_idf_svc::sys::{heap_caps_get_free_size, MALLOC_CAP_INTERNAL};

        log::info!(
            "Free INTERNAL heap size: {}KB",
            heap_caps_get_free_size(MALLOC_CAP_INTERNAL) / 1024
        );
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("easy-config firmware runs on ESP-IDF targets only, e.g. --target xtensa-esp32-espidf");
}
