fn main() {
    voice_intent_lib::run()
}
