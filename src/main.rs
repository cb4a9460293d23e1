fn main() {
    corroscan_lib::run()
}
