fn main() {
    bracket_engine_lib::run()
}
