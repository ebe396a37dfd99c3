fn main() {
    println!("cargo:rerun-if-changed=src/usb_midi_bindings.h");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
